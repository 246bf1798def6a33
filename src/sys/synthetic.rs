//! In-process desktop: a window list, an imaging backend that paints each
//! window a solid color, and a focus activator that records what it raised.
//!
//! Drives the `replay` command and the tests. Every backend call is logged so
//! callers can assert on ordering (e.g. that outputs are detached before a
//! stream is closed).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::common::collections::{HashMap, HashSet};
use crate::model::{Display, WindowEntry, WindowId, WindowScope, pid_t};
use crate::sys::backend::{
    BackendError, CaptureTarget, FrameOutput, ImagingBackend, RawImage, ResolutionBudget,
    StreamFrame, StreamHandle,
};
use crate::sys::enumerate::{CandidateFilter, RawWindowInfo, WindowEnumerator, filter_candidates};
use crate::sys::event_tap::InputTap;
use crate::sys::focus::FocusActivator;
use crate::sys::geometry::Rect;

/// A window as described in a replay transcript.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SyntheticWindow {
    pub id: WindowId,
    #[serde(default)]
    pub title: Option<String>,
    pub owner: String,
    pub pid: pid_t,
    pub bounds: Rect,
    /// Capture requests for this window fail as if the OS refused them.
    #[serde(default)]
    pub declined: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOp {
    Open { handle: StreamHandle, window: WindowId },
    Retarget { handle: StreamHandle, window: WindowId, reconfigured: bool },
    Detach(StreamHandle),
    Close(StreamHandle),
}

struct Stream {
    target: CaptureTarget,
    budget: ResolutionBudget,
    output: Option<FrameOutput>,
}

#[derive(Default)]
struct State {
    windows: Vec<SyntheticWindow>,
    active_display: Option<Display>,
    streams: HashMap<StreamHandle, Stream>,
    activations: Vec<WindowId>,
    captures: Vec<WindowId>,
    stream_log: Vec<StreamOp>,
    failing_retargets: usize,
    failing_opens: HashSet<WindowId>,
}

/// Lets retargets through one at a time, in arrival order.
#[derive(Default)]
struct RetargetGate {
    gated: bool,
    arrived: usize,
    allowed: usize,
}

#[derive(Default)]
pub struct SyntheticDesktop {
    state: Mutex<State>,
    next_handle: AtomicU64,
    held: Mutex<bool>,
    released: Condvar,
    retarget_gate: Mutex<RetargetGate>,
    retarget_moved: Condvar,
    tap_disabled: AtomicBool,
    tap_enables: AtomicU64,
    self_pid: pid_t,
}

impl SyntheticDesktop {
    pub fn new(windows: Vec<SyntheticWindow>) -> Self {
        let desktop = Self::default();
        desktop.state.lock().windows = windows;
        desktop
    }

    pub fn add_window(&self, window: SyntheticWindow) { self.state.lock().windows.push(window); }

    /// Moves a window to the front of the most-recently-used order.
    pub fn raise(&self, id: WindowId) {
        let mut state = self.state.lock();
        if let Some(pos) = state.windows.iter().position(|w| w.id == id) {
            let window = state.windows.remove(pos);
            state.windows.insert(0, window);
        }
    }

    /// The display reported as being under the pointer.
    pub fn set_active_display(&self, display: Option<Display>) {
        self.state.lock().active_display = display;
    }

    pub fn fail_next_retargets(&self, count: usize) { self.state.lock().failing_retargets = count; }

    pub fn fail_stream_opens_for(&self, id: WindowId) { self.state.lock().failing_opens.insert(id); }

    /// Blocks every `capture_still` and `retarget` call until `release`.
    pub fn hold(&self) { *self.held.lock() = true; }

    pub fn release(&self) {
        *self.held.lock() = false;
        self.released.notify_all();
    }

    fn wait_while_held(&self) {
        let mut held = self.held.lock();
        while *held {
            self.released.wait(&mut held);
        }
    }

    /// From now on every `retarget` call blocks until `allow_retargets` lets
    /// it through.
    pub fn gate_retargets(&self) {
        *self.retarget_gate.lock() = RetargetGate {
            gated: true,
            ..RetargetGate::default()
        };
    }

    pub fn allow_retargets(&self, count: usize) {
        self.retarget_gate.lock().allowed += count;
        self.retarget_moved.notify_all();
    }

    /// Waits until `count` gated retargets have reached the backend.
    pub fn wait_for_retargets(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.retarget_gate.lock();
        while gate.arrived < count {
            if self.retarget_moved.wait_until(&mut gate, deadline).timed_out() {
                return gate.arrived >= count;
            }
        }
        true
    }

    fn pass_retarget_gate(&self) {
        let mut gate = self.retarget_gate.lock();
        if !gate.gated {
            return;
        }
        let turn = gate.arrived;
        gate.arrived += 1;
        self.retarget_moved.notify_all();
        while gate.allowed <= turn {
            self.retarget_moved.wait(&mut gate);
        }
    }

    /// Turns the input tap off, the way the OS does after a slow callback.
    pub fn disable_input_tap(&self) { self.tap_disabled.store(true, Ordering::SeqCst); }

    pub fn tap_enables(&self) -> u64 { self.tap_enables.load(Ordering::SeqCst) }

    pub fn activations(&self) -> Vec<WindowId> { self.state.lock().activations.clone() }

    pub fn captures(&self) -> Vec<WindowId> { self.state.lock().captures.clone() }

    pub fn stream_log(&self) -> Vec<StreamOp> { self.state.lock().stream_log.clone() }

    pub fn open_streams(&self) -> usize { self.state.lock().streams.len() }

    /// Delivers one frame on `handle` from the calling thread, the way a
    /// backend callback queue would. Returns false if nothing was attached.
    pub fn emit_frame(&self, handle: StreamHandle, complete: bool) -> bool {
        let (output, image) = {
            let state = self.state.lock();
            let Some(stream) = state.streams.get(&handle) else {
                return false;
            };
            let Some(output) = stream.output.clone() else {
                return false;
            };
            (output, paint(stream.target.window_id, stream.budget))
        };
        output(StreamFrame { handle, image, complete });
        true
    }

    /// Delivers one complete frame on every attached stream.
    pub fn pump_streams(&self) -> usize {
        let handles: Vec<StreamHandle> = self.state.lock().streams.keys().copied().collect();
        handles.into_iter().filter(|&handle| self.emit_frame(handle, true)).count()
    }

    fn window(&self, id: WindowId) -> Option<SyntheticWindow> {
        self.state.lock().windows.iter().find(|w| w.id == id).cloned()
    }
}

/// Solid color derived from the window id, so tests can tell frames apart.
pub fn window_color(id: WindowId) -> Rgba<u8> {
    let n = id.as_u32();
    Rgba([
        (n.wrapping_mul(53) % 256) as u8,
        (n.wrapping_mul(97) % 256) as u8,
        (n.wrapping_mul(151) % 256) as u8,
        255,
    ])
}

fn paint(id: WindowId, budget: ResolutionBudget) -> RawImage {
    RgbaImage::from_pixel(budget.width.max(1), budget.height.max(1), window_color(id))
}

impl WindowEnumerator for SyntheticDesktop {
    fn list(&self, scope: WindowScope) -> Vec<WindowEntry> {
        let raw: Vec<RawWindowInfo> = self
            .state
            .lock()
            .windows
            .iter()
            .map(|w| RawWindowInfo {
                id: w.id,
                layer: 0,
                alpha: 1.0,
                owner_pid: w.pid,
                owner_name: w.owner.clone(),
                title: w.title.clone(),
                bounds: w.bounds,
            })
            .collect();
        filter_candidates(&raw, &CandidateFilter::new(self.self_pid, scope))
    }

    fn active_display(&self) -> Option<Display> { self.state.lock().active_display }
}

impl ImagingBackend for SyntheticDesktop {
    fn resolve(&self, id: WindowId) -> Result<CaptureTarget, BackendError> {
        let window = self.window(id).ok_or(BackendError::TargetNotFound(id))?;
        Ok(CaptureTarget { window_id: id, bounds: window.bounds })
    }

    fn capture_still(
        &self,
        target: &CaptureTarget,
        budget: ResolutionBudget,
    ) -> Result<RawImage, BackendError> {
        self.wait_while_held();
        let id = target.window_id;
        self.state.lock().captures.push(id);
        let window = self.window(id).ok_or(BackendError::TargetNotFound(id))?;
        if window.declined {
            return Err(BackendError::Declined(id));
        }
        Ok(paint(id, budget))
    }

    fn open_stream(
        &self,
        target: &CaptureTarget,
        budget: ResolutionBudget,
        output: FrameOutput,
    ) -> Result<StreamHandle, BackendError> {
        let mut state = self.state.lock();
        if state.failing_opens.contains(&target.window_id) {
            return Err(BackendError::Declined(target.window_id));
        }
        let handle = StreamHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        state.streams.insert(
            handle,
            Stream {
                target: target.clone(),
                budget,
                output: Some(output),
            },
        );
        state.stream_log.push(StreamOp::Open { handle, window: target.window_id });
        trace!(%handle, window = %target.window_id, "synthetic stream opened");
        Ok(handle)
    }

    fn retarget(
        &self,
        handle: StreamHandle,
        target: &CaptureTarget,
        budget: Option<ResolutionBudget>,
    ) -> Result<(), BackendError> {
        self.wait_while_held();
        self.pass_retarget_gate();
        let mut state = self.state.lock();
        if state.failing_retargets > 0 {
            state.failing_retargets -= 1;
            return Err(BackendError::Other("stream refused new filter".into()));
        }
        let stream = state.streams.get_mut(&handle).ok_or(BackendError::UnknownStream(handle))?;
        stream.target = target.clone();
        if let Some(budget) = budget {
            stream.budget = budget;
        }
        state.stream_log.push(StreamOp::Retarget {
            handle,
            window: target.window_id,
            reconfigured: budget.is_some(),
        });
        Ok(())
    }

    fn detach_output(&self, handle: StreamHandle) {
        let mut state = self.state.lock();
        if let Some(stream) = state.streams.get_mut(&handle) {
            stream.output = None;
            state.stream_log.push(StreamOp::Detach(handle));
        }
    }

    fn close(&self, handle: StreamHandle) {
        let mut state = self.state.lock();
        if state.streams.remove(&handle).is_some() {
            state.stream_log.push(StreamOp::Close(handle));
        }
    }
}

impl InputTap for SyntheticDesktop {
    fn is_enabled(&self) -> bool { !self.tap_disabled.load(Ordering::SeqCst) }

    fn enable(&self) {
        self.tap_enables.fetch_add(1, Ordering::SeqCst);
        self.tap_disabled.store(false, Ordering::SeqCst);
    }
}

impl FocusActivator for SyntheticDesktop {
    fn activate(&self, entry: &WindowEntry) {
        self.state.lock().activations.push(entry.id);
        self.raise(entry.id);
    }
}
