//! The coordination context. Owns the session and applies intents, capture
//! results and live frames strictly in arrival order.

use std::sync::Arc;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument};

use crate::actor::{self, presentation};
use crate::capture::{ImageUpdate, UpdateSink};
use crate::common::config::{Config, PreviewMode};
use crate::input::{GestureHandle, Intent};
use crate::model::{Display, WindowEntry, WindowScope};
use crate::session::{SessionStats, SwitcherSession};
use crate::sys::backend::ImagingBackend;
use crate::sys::enumerate::WindowEnumerator;
use crate::sys::focus::FocusActivator;

#[derive(Debug)]
pub enum Event {
    Intent { intent: Intent, repeat: bool },
    Image(ImageUpdate),
    /// The live engine has a frame waiting in its mailbox.
    LiveFrameReady,
    ExternalDismiss,
    SetPreviewMode(PreviewMode),
    UpdateConfig(Config),
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

/// The OS services the switcher talks to.
#[derive(Clone)]
pub struct Platform {
    pub enumerator: Arc<dyn WindowEnumerator>,
    pub backend: Arc<dyn ImagingBackend>,
    pub activator: Arc<dyn FocusActivator>,
}

pub struct SwitcherActor {
    config: Config,
    rx: Receiver,
    session: SwitcherSession,
    enumerator: Arc<dyn WindowEnumerator>,
    gesture: Option<GestureHandle>,
    retarget_at: Option<Instant>,
    refresh_at: Option<Instant>,
}

impl SwitcherActor {
    /// `tx` must be the sender paired with `rx`; background work reports back
    /// through it without keeping the actor alive.
    pub fn new(
        config: Config,
        tx: &Sender,
        rx: Receiver,
        platform: Platform,
        presentation: presentation::Sender,
    ) -> Self {
        let images = tx.downgrade();
        let sink: UpdateSink = Arc::new(move |update: ImageUpdate| images.send(Event::Image(update)));
        let frames = tx.downgrade();
        let session = SwitcherSession::new(
            config.settings.clone(),
            platform.backend,
            platform.activator,
            presentation,
            sink,
            move || frames.send(Event::LiveFrameReady),
        );
        Self {
            config,
            rx,
            session,
            enumerator: platform.enumerator,
            gesture: None,
            retarget_at: None,
            refresh_at: None,
        }
    }

    /// Lets the actor put the gesture back to idle when a session ends
    /// without it.
    pub fn set_gesture(&mut self, gesture: GestureHandle) { self.gesture = Some(gesture); }

    pub fn session(&self) -> &SwitcherSession { &self.session }

    pub fn stats(&self) -> SessionStats { self.session.stats() }

    pub async fn run(mut self) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some((span, event)) => {
                        let _enter = span.enter();
                        self.handle_event(event);
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_timers(Instant::now());
                }
            }
        }
        if self.session.cancel() {
            debug!("switcher closed on shutdown");
        }
    }

    #[instrument(skip(self))]
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Intent { intent, repeat } => self.handle_intent(intent, repeat),
            Event::Image(update) => {
                self.session.apply_update(update);
            }
            Event::LiveFrameReady => {
                self.session.take_live_frame();
            }
            Event::ExternalDismiss => {
                if self.session.external_dismiss() {
                    self.reset_gesture();
                }
                self.clear_timers();
            }
            Event::SetPreviewMode(mode) => {
                self.clear_timers();
                self.session.set_preview_mode(mode);
            }
            Event::UpdateConfig(config) => {
                self.session.update_settings(config.settings.clone());
                self.config = config;
            }
        }
    }

    /// Runs whichever of the retarget and refresh timers are due at `now`.
    pub fn fire_timers(&mut self, now: Instant) {
        if self.retarget_at.is_some_and(|at| at <= now) {
            self.retarget_at = None;
            self.session.retarget_live();
            self.refresh_at = Some(now + self.config.settings.switcher.refresh_after_retarget());
        }
        if self.refresh_at.is_some_and(|at| at <= now) {
            self.refresh_at = None;
            self.session.refresh_thumbnails();
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.retarget_at, self.refresh_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_intent(&mut self, intent: Intent, repeat: bool) {
        match intent {
            Intent::Show => self.show(),
            Intent::Advance | Intent::Retreat => {
                let moved = if intent == Intent::Advance {
                    self.session.advance(repeat)
                } else {
                    self.session.retreat(repeat)
                };
                if moved && self.session.wants_live() {
                    self.retarget_at =
                        Some(Instant::now() + self.config.settings.switcher.retarget_debounce());
                    self.refresh_at = None;
                }
            }
            Intent::Confirm => {
                self.clear_timers();
                self.session.confirm();
            }
            Intent::Cancel => {
                self.clear_timers();
                self.session.cancel();
            }
            Intent::QuickSwitch => {
                self.clear_timers();
                let (candidates, _) = self.candidates();
                if self.session.quick_switch(&candidates).is_none() {
                    debug!(candidates = candidates.len(), "nothing to quick switch to");
                }
            }
        }
    }

    fn show(&mut self) {
        if self.session.is_open() {
            debug!("switcher already open");
            return;
        }
        let (candidates, display) = self.candidates();
        self.clear_timers();
        if !self.session.open(candidates, display) {
            self.reset_gesture();
        }
    }

    fn candidates(&self) -> (Vec<WindowEntry>, Option<Display>) {
        let display = if self.config.settings.switcher.per_monitor {
            self.enumerator.active_display()
        } else {
            None
        };
        let scope = match display {
            Some(display) => WindowScope::Display(display.frame),
            None => WindowScope::All,
        };
        (self.enumerator.list(scope), display)
    }

    fn clear_timers(&mut self) {
        self.retarget_at = None;
        self.refresh_at = None;
    }

    fn reset_gesture(&self) {
        if let Some(gesture) = &self.gesture {
            gesture.reset();
        }
    }
}
