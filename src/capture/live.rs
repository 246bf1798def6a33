//! Continuous low-rate preview of the focused window.
//!
//! At most one backend stream is open. Stream control (open, retarget,
//! close) runs on a dedicated control thread; frames arrive on backend
//! threads and pass a gate that drops anything that could belong to the
//! wrong window, then a rate gate, then land in a single-slot mailbox read
//! by the coordination context.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use strum::Display;
use tracing::{debug, trace, warn};

use crate::capture::geometry::{CardGeometry, resolution_budget};
use crate::capture::mailbox::Mailbox;
use crate::capture::process::{CardCanvas, render_card};
use crate::capture::throttle::RateGate;
use crate::capture::{ImageUpdate, UpdateSource};
use crate::common::config::{LiveSettings, Settings};
use crate::model::{WindowEntry, WindowId};
use crate::sys::backend::{
    CaptureTarget, FrameOutput, ImagingBackend, ResolutionBudget, StreamFrame, StreamHandle,
};
use crate::sys::geometry::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum LivePhase {
    Closed,
    Opening,
    Active,
    Reconfiguring,
}

#[derive(Clone, Debug)]
struct LiveTarget {
    ticket: u64,
    window_id: WindowId,
    bounds: Rect,
}

enum Command {
    Retarget(LiveTarget),
    Stop,
    Barrier(Sender<()>),
}

/// Everything the frame path needs, behind one short-lived lock.
struct FrameGate {
    /// Cleared synchronously by `stop()`; nothing is published while false.
    attached: bool,
    handle: Option<StreamHandle>,
    target: Option<LiveTarget>,
    /// Set while the stream is being pointed at a new window.
    switching: bool,
    settle_remaining: u32,
    rate: RateGate,
    settings: LiveSettings,
    card: CardGeometry,
    shade: f32,
}

impl FrameGate {
    fn canvas(&self, bounds: &Rect) -> CardCanvas {
        let (width, height) = self.card.canvas_size(bounds, self.settings.scale);
        CardCanvas {
            width,
            height,
            shade: self.shade,
            trim_dark_edges: self.settings.trim_dark_edges,
        }
    }

    fn budget(&self, bounds: &Rect) -> ResolutionBudget {
        resolution_budget(bounds, self.settings.max_dimension, self.settings.scale)
    }

    fn targets(&self, window_id: WindowId) -> bool {
        self.attached && self.target.as_ref().is_some_and(|t| t.window_id == window_id)
    }

    /// Ends the switch to `window_id`. If the target has moved on meanwhile,
    /// the gate stays closed for the retarget that follows.
    fn finish_switch(&mut self, window_id: WindowId, settle_frames: u32) -> bool {
        if !self.targets(window_id) {
            return false;
        }
        self.switching = false;
        self.settle_remaining = settle_frames;
        self.rate.reset();
        true
    }
}

struct Shared {
    backend: Arc<dyn ImagingBackend>,
    gate: Mutex<FrameGate>,
    phase: Mutex<LivePhase>,
    mailbox: Mailbox<ImageUpdate>,
    notify: Box<dyn Fn() + Send + Sync>,
}

pub struct LivePreview {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    current: Option<WindowId>,
}

impl LivePreview {
    /// `notify` is called from a backend thread whenever a frame becomes
    /// available and no delivery is pending yet; it should wake the
    /// coordination context, which then calls [`LivePreview::take_frame`].
    pub fn new(
        backend: Arc<dyn ImagingBackend>,
        settings: &Settings,
        notify: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            backend,
            gate: Mutex::new(FrameGate {
                attached: false,
                handle: None,
                target: None,
                switching: false,
                settle_remaining: 0,
                rate: RateGate::new(settings.live.min_frame_interval()),
                settings: settings.live.clone(),
                card: CardGeometry::new(settings.card),
                shade: settings.capture.background_shade,
            }),
            phase: Mutex::new(LivePhase::Closed),
            mailbox: Mailbox::new(),
            notify: Box::new(notify),
        });
        let (commands, rx) = unbounded();
        let control = Control { shared: shared.clone(), stream: None };
        let spawned = thread::Builder::new()
            .name("live-preview".into())
            .spawn(move || control.run(&rx));
        if let Err(err) = spawned {
            warn!(%err, "could not start live preview control thread");
        }
        Self { shared, commands, current: None }
    }

    pub fn set_settings(&self, settings: &Settings) {
        let mut gate = self.shared.gate.lock();
        gate.rate.set_interval(settings.live.min_frame_interval());
        gate.settings = settings.live.clone();
        gate.card = CardGeometry::new(settings.card);
        gate.shade = settings.capture.background_shade;
    }

    pub fn phase(&self) -> LivePhase { *self.shared.phase.lock() }

    /// Points the preview at `entry`, opening a stream if none is open.
    /// Retargeting the window already shown only adopts the new ticket.
    pub fn retarget(&mut self, entry: &WindowEntry, ticket: u64) {
        let same = self.current == Some(entry.id) && self.phase() != LivePhase::Closed;
        let target = LiveTarget {
            ticket,
            window_id: entry.id,
            bounds: entry.bounds,
        };
        {
            let mut gate = self.shared.gate.lock();
            gate.attached = true;
            if same {
                if let Some(current) = gate.target.as_mut() {
                    current.ticket = ticket;
                }
            } else {
                gate.switching = true;
                gate.target = Some(target.clone());
            }
        }
        if same {
            trace!(window = %entry.id, ticket, "live target unchanged");
            return;
        }
        self.current = Some(entry.id);
        if self.commands.send(Command::Retarget(target)).is_err() {
            warn!("live preview control thread is gone");
        }
    }

    /// Stops publishing immediately and closes the stream in the background,
    /// detaching the backend output before the connection is torn down.
    pub fn stop(&mut self) {
        if self.current.take().is_none() {
            return;
        }
        {
            let mut gate = self.shared.gate.lock();
            gate.attached = false;
            gate.target = None;
            gate.switching = false;
        }
        self.shared.mailbox.clear();
        let _ = self.commands.send(Command::Stop);
    }

    /// The newest frame not yet delivered, if any.
    pub fn take_frame(&self) -> Option<ImageUpdate> { self.shared.mailbox.take() }

    /// Blocks until the control thread has handled every command sent so far.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (done, rx) = bounded(1);
        if self.commands.send(Command::Barrier(done)).is_err() {
            return false;
        }
        rx.recv_timeout(timeout).is_ok()
    }
}

impl Drop for LivePreview {
    fn drop(&mut self) { self.stop(); }
}

impl Shared {
    fn set_phase(&self, phase: LivePhase) {
        let mut current = self.phase.lock();
        let previous = *current;
        if previous != phase {
            debug!(from = %previous, to = %phase, "live preview");
            *current = phase;
        }
    }

    fn on_frame(&self, frame: StreamFrame) {
        let (target, canvas) = {
            let mut gate = self.gate.lock();
            if !frame.complete {
                trace!("incomplete frame dropped");
                return;
            }
            if !gate.attached || gate.handle != Some(frame.handle) || gate.switching {
                trace!(handle = %frame.handle, "frame dropped while detached or switching");
                return;
            }
            if gate.settle_remaining > 0 {
                gate.settle_remaining -= 1;
                return;
            }
            let Some(target) = gate.target.clone() else {
                return;
            };
            if !gate.rate.admit(Instant::now()) {
                return;
            }
            let canvas = gate.canvas(&target.bounds);
            (target, canvas)
        };

        let image = Arc::new(render_card(frame.image, &canvas));
        let update = ImageUpdate {
            ticket: target.ticket,
            window_id: target.window_id,
            image,
            source: UpdateSource::Live,
        };
        let scheduled = {
            let gate = self.gate.lock();
            if !gate.targets(target.window_id) || gate.switching {
                return;
            }
            self.mailbox.push(update)
        };
        if scheduled {
            (self.notify)();
        }
    }
}

struct OpenStream {
    handle: StreamHandle,
    budget: ResolutionBudget,
    window_id: WindowId,
}

struct Control {
    shared: Arc<Shared>,
    stream: Option<OpenStream>,
}

impl Control {
    fn run(mut self, rx: &Receiver<Command>) {
        while let Ok(command) = rx.recv() {
            match command {
                Command::Retarget(target) => self.retarget(target),
                Command::Stop => self.close(),
                Command::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
        self.close();
    }

    fn retarget(&mut self, target: LiveTarget) {
        let budget = {
            let mut gate = self.shared.gate.lock();
            if !gate.targets(target.window_id) {
                trace!(window = %target.window_id, "superseded live retarget skipped");
                return;
            }
            gate.switching = true;
            gate.budget(&target.bounds)
        };
        let resolved = match self.shared.backend.resolve(target.window_id) {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!(window = %target.window_id, %err, "live target unavailable");
                self.close();
                return;
            }
        };

        let current = self.stream.as_ref().map(|s| (s.handle, s.budget, s.window_id));
        if let Some((handle, old_budget, window_id)) = current {
            if window_id == target.window_id {
                let mut gate = self.shared.gate.lock();
                if gate.targets(window_id) {
                    gate.switching = false;
                }
                return;
            }
            self.shared.set_phase(LivePhase::Reconfiguring);
            let new_budget = (old_budget != budget).then_some(budget);
            match self.shared.backend.retarget(handle, &resolved, new_budget) {
                Ok(()) => {
                    self.stream = Some(OpenStream { handle, budget, window_id: target.window_id });
                    let finished = {
                        let mut gate = self.shared.gate.lock();
                        let settle = gate.settings.settle_frames;
                        gate.finish_switch(target.window_id, settle)
                    };
                    self.shared.set_phase(LivePhase::Active);
                    debug!(%handle, window = %target.window_id, reconfigured = new_budget.is_some(), finished, "live stream retargeted");
                    return;
                }
                Err(err) => {
                    warn!(%handle, %err, "live retarget failed; reopening");
                    self.close();
                }
            }
        }
        self.open(&target, &resolved, budget);
    }

    fn open(&mut self, target: &LiveTarget, resolved: &CaptureTarget, budget: ResolutionBudget) {
        self.shared.set_phase(LivePhase::Opening);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let output: FrameOutput = Arc::new(move |frame| {
            if let Some(shared) = weak.upgrade() {
                shared.on_frame(frame);
            }
        });
        match self.shared.backend.open_stream(resolved, budget, output) {
            Ok(handle) => {
                self.stream = Some(OpenStream { handle, budget, window_id: target.window_id });
                let mut gate = self.shared.gate.lock();
                gate.handle = Some(handle);
                gate.finish_switch(target.window_id, 0);
                drop(gate);
                self.shared.set_phase(LivePhase::Active);
                debug!(%handle, window = %target.window_id, "live stream opened");
            }
            Err(err) => {
                warn!(window = %target.window_id, %err, "could not open live stream");
                self.shared.gate.lock().switching = false;
                self.shared.set_phase(LivePhase::Closed);
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.shared.gate.lock().handle = None;
            self.shared.backend.detach_output(stream.handle);
            self.shared.backend.close(stream.handle);
            debug!(handle = %stream.handle, "live stream closed");
        }
        self.shared.set_phase(LivePhase::Closed);
    }
}
