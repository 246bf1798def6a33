//! Plays a recorded input transcript through the gesture tap, the switcher
//! actor and a synthetic desktop, and reports what the overlay was told and
//! which windows were raised.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use crate::actor::presentation::PresentationEvent;
use crate::actor::switcher::{self, Platform, SwitcherActor};
use crate::actor;
use crate::common::config::{Config, PreviewMode};
use crate::input::{GestureTap, InputEvent};
use crate::model::{Display, WindowId};
use crate::sys::synthetic::{SyntheticDesktop, SyntheticWindow};

/// Quiet period after the last step so background work can report in.
const SETTLE: Duration = Duration::from_millis(100);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Transcript {
    /// Front to back, the active window first.
    pub windows: Vec<SyntheticWindow>,
    #[serde(default)]
    pub active_display: Option<Display>,
    pub steps: Vec<Step>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// One event from the input tap.
    Input(InputEvent),
    /// Milliseconds.
    Wait(u64),
    /// Deliver this many frames on every open live stream.
    Frames(usize),
    /// The OS turns the input tap off.
    DisableTap,
    Dismiss,
    Preview(PreviewMode),
}

impl Transcript {
    pub fn parse(buf: &str) -> Result<Self, serde_json::Error> { serde_json::from_str(buf) }
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub events: Vec<PresentationEvent>,
    pub activations: Vec<WindowId>,
    pub tap_enables: u64,
}

impl ReplayReport {
    /// Presentation events other than thumbnails, which arrive in no fixed
    /// order relative to the rest.
    pub fn transitions(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| !matches!(e, PresentationEvent::Thumbnail { .. }))
            .map(ToString::to_string)
            .collect()
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            writeln!(f, "{event}")?;
        }
        for id in &self.activations {
            writeln!(f, "activated {id}")?;
        }
        if self.tap_enables > 0 {
            writeln!(f, "tap re-enabled {} time(s)", self.tap_enables)?;
        }
        Ok(())
    }
}

/// Runs `transcript` to completion on the current runtime.
pub async fn replay(config: Config, transcript: Transcript) -> ReplayReport {
    let desktop = Arc::new(SyntheticDesktop::new(transcript.windows));
    desktop.set_active_display(transcript.active_display);

    let (tx, rx) = actor::channel::<switcher::Event>();
    let (presentation_tx, mut presentation_rx) = actor::channel();
    let platform = Platform {
        enumerator: desktop.clone(),
        backend: desktop.clone(),
        activator: desktop.clone(),
    };
    let mut switcher = SwitcherActor::new(config.clone(), &tx, rx, platform, presentation_tx);
    let tap = GestureTap::new(&config.settings.gesture, desktop.clone(), tx.clone(), Handle::current());
    switcher.set_gesture(tap.handle());
    let task = tokio::spawn(switcher.run());

    for (n, step) in transcript.steps.into_iter().enumerate() {
        debug!(n, ?step, "replay step");
        match step {
            Step::Input(event) => {
                tap.on_event(event);
            }
            Step::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Frames(count) => {
                for _ in 0..count {
                    desktop.pump_streams();
                    tokio::time::sleep(config.settings.live.min_frame_interval()).await;
                }
            }
            Step::DisableTap => {
                desktop.disable_input_tap();
                tap.on_event(InputEvent::TapDisabled);
            }
            Step::Dismiss => tx.send(switcher::Event::ExternalDismiss),
            Step::Preview(mode) => tx.send(switcher::Event::SetPreviewMode(mode)),
        }
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(SETTLE).await;

    // The actor stops once every sender, including the tap's and any pending
    // grace timer's, is gone.
    drop(tap);
    drop(tx);
    if let Err(err) = task.await {
        debug!(%err, "switcher task ended abnormally");
    }

    let mut report = ReplayReport {
        activations: desktop.activations(),
        tap_enables: desktop.tap_enables(),
        ..ReplayReport::default()
    };
    while let Ok((_, event)) = presentation_rx.try_recv() {
        report.events.push(event);
    }
    report
}
