//! The gesture state machine.
//!
//! `Idle -> Primed -> Showing -> Idle`. The first advance key with the
//! modifier held primes the gesture and asks the caller to schedule a grace
//! timer. Releasing the modifier before the timer fires is a quick switch;
//! a second advance key or the timer firing opens the switcher.
//!
//! The recognizer never sleeps or dispatches anything itself. Each call
//! returns a [`Reaction`] and the driver acts on it, so a call always
//! returns immediately.

use std::time::Duration;

use tracing::trace;

use crate::input::{InputEvent, Intent, KeyCode};

/// Identifies one scheduled grace timer. Only the most recently scheduled
/// token is honoured; anything else has been cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraceToken(u64);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    pub intents: Vec<Intent>,
    /// Grace timer to start: call [`GestureRecognizer::grace_elapsed`] with
    /// the token after the delay.
    pub schedule: Option<(GraceToken, Duration)>,
    /// The key should not reach the focused application.
    pub swallow: bool,
}

impl Reaction {
    fn swallowed(intents: Vec<Intent>) -> Self { Self { intents, schedule: None, swallow: true } }

    fn emit(intents: Vec<Intent>) -> Self { Self { intents, schedule: None, swallow: false } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Primed,
    Showing,
}

#[derive(Debug)]
pub struct GestureRecognizer {
    grace_delay: Duration,
    phase: Phase,
    modifier_held: bool,
    pending_grace: Option<GraceToken>,
    /// Step of the key that primed the gesture, emitted once it opens.
    pending_step: Option<Intent>,
    next_token: u64,
}

impl GestureRecognizer {
    pub fn new(grace_delay: Duration) -> Self {
        Self {
            grace_delay,
            phase: Phase::Idle,
            modifier_held: false,
            pending_grace: None,
            pending_step: None,
            next_token: 0,
        }
    }

    pub fn set_grace_delay(&mut self, grace_delay: Duration) { self.grace_delay = grace_delay; }

    pub fn is_idle(&self) -> bool { self.phase == Phase::Idle }

    pub fn is_primed(&self) -> bool { self.phase == Phase::Primed }

    pub fn is_showing(&self) -> bool { self.phase == Phase::Showing }

    pub fn modifier_held(&self) -> bool { self.modifier_held }

    pub fn handle(&mut self, event: InputEvent) -> Reaction {
        let reaction = match event {
            InputEvent::ModifierChanged { held } => self.on_modifier(held),
            InputEvent::Key { code, modifier_held, shift_held, .. } => {
                self.on_key(code, modifier_held, shift_held)
            }
            InputEvent::TapDisabled => Reaction::default(),
        };
        trace!(?event, phase = ?self.phase, intents = ?reaction.intents, "gesture");
        reaction
    }

    /// Called when a scheduled grace timer fires.
    pub fn grace_elapsed(&mut self, token: GraceToken) -> Reaction {
        if self.pending_grace != Some(token) {
            return Reaction::default();
        }
        self.pending_grace = None;
        if self.phase != Phase::Primed {
            return Reaction::default();
        }
        if !self.modifier_held {
            self.to_idle();
            return Reaction::default();
        }
        self.phase = Phase::Showing;
        let step = self.pending_step.take().unwrap_or(Intent::Advance);
        Reaction::emit(vec![Intent::Show, step])
    }

    /// Forces the gesture back to `Idle` when the session ended for a reason
    /// the recognizer did not see.
    pub fn reset(&mut self) { self.to_idle(); }

    fn on_modifier(&mut self, held: bool) -> Reaction {
        self.modifier_held = held;
        if held {
            return Reaction::default();
        }
        match self.phase {
            Phase::Idle => Reaction::default(),
            Phase::Primed => {
                self.to_idle();
                Reaction::emit(vec![Intent::QuickSwitch])
            }
            Phase::Showing => {
                self.to_idle();
                Reaction::emit(vec![Intent::Confirm])
            }
        }
    }

    fn on_key(&mut self, code: KeyCode, modifier_held: bool, shift_held: bool) -> Reaction {
        self.modifier_held = modifier_held;

        // A key without the modifier while showing means the release was lost.
        if self.phase == Phase::Showing && !modifier_held {
            self.to_idle();
            return Reaction::emit(vec![Intent::Cancel]);
        }

        match code {
            KeyCode::Tab if modifier_held => {
                let step = if shift_held { Intent::Retreat } else { Intent::Advance };
                self.on_advance_key(step)
            }
            KeyCode::Escape => match self.phase {
                Phase::Showing => {
                    self.to_idle();
                    Reaction::swallowed(vec![Intent::Cancel])
                }
                Phase::Primed => {
                    self.to_idle();
                    Reaction::swallowed(Vec::new())
                }
                Phase::Idle => Reaction::default(),
            },
            _ => Reaction::default(),
        }
    }

    fn on_advance_key(&mut self, step: Intent) -> Reaction {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Primed;
                self.pending_step = Some(step);
                self.next_token += 1;
                let token = GraceToken(self.next_token);
                self.pending_grace = Some(token);
                Reaction {
                    intents: Vec::new(),
                    schedule: Some((token, self.grace_delay)),
                    swallow: true,
                }
            }
            Phase::Primed => {
                self.pending_grace = None;
                self.phase = Phase::Showing;
                let primed = self.pending_step.take().unwrap_or(Intent::Advance);
                Reaction::swallowed(vec![Intent::Show, primed, step])
            }
            Phase::Showing => {
                self.pending_grace = None;
                Reaction::swallowed(vec![step])
            }
        }
    }

    fn to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.pending_grace = None;
        self.pending_step = None;
    }
}
