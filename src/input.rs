//! Global input handling: raw modifier/key events in, switcher intents out.

use serde::{Deserialize, Serialize};

pub mod recognizer;
pub mod tap;

pub use recognizer::{GestureRecognizer, GraceToken, Reaction};
pub use tap::{GestureHandle, GestureTap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    /// The advance key.
    Tab,
    Escape,
    Other(u16),
}

/// One event as delivered by the input tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    ModifierChanged {
        held: bool,
    },
    Key {
        code: KeyCode,
        modifier_held: bool,
        #[serde(default)]
        shift_held: bool,
        /// Generated by key auto-repeat rather than a fresh press.
        #[serde(default)]
        repeat: bool,
    },
    /// The platform turned the tap off (e.g. after a callback timeout).
    TapDisabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Intent {
    Show,
    Advance,
    Retreat,
    Confirm,
    Cancel,
    QuickSwitch,
}

impl Intent {
    pub fn is_step(self) -> bool { matches!(self, Intent::Advance | Intent::Retreat) }
}
