use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
        .join("section")
        .join("section.toml")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub gesture: GestureSettings,
    pub switcher: SwitcherSettings,
    pub capture: CaptureSettings,
    pub live: LiveSettings,
    pub card: CardSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GestureSettings {
    /// Time after the first advance key during which releasing the modifier
    /// is a quick-switch rather than opening the overlay.
    pub grace_delay_ms: u64,
    /// How often the input tap is checked and re-enabled if the OS turned it off.
    pub tap_watchdog_secs: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            grace_delay_ms: 120,
            tap_watchdog_secs: 5,
        }
    }
}

impl GestureSettings {
    pub fn grace_delay(&self) -> Duration { Duration::from_millis(self.grace_delay_ms) }

    pub fn tap_watchdog(&self) -> Duration { Duration::from_secs(self.tap_watchdog_secs) }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    /// One-shot thumbnails only.
    #[default]
    Picture,
    /// Thumbnails plus a live stream of the focused window.
    Video,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SwitcherSettings {
    pub preview: PreviewMode,
    /// Only offer windows on the display under the pointer.
    pub per_monitor: bool,
    /// Minimum spacing between applied auto-repeat steps.
    pub step_interval_ms: u64,
    /// Quiet period after the last step before the live stream is retargeted.
    pub retarget_debounce_ms: u64,
    /// Delay after a live retarget before thumbnails are refreshed around the
    /// new focus.
    pub refresh_after_retarget_ms: u64,
}

impl Default for SwitcherSettings {
    fn default() -> Self {
        Self {
            preview: PreviewMode::Picture,
            per_monitor: true,
            step_interval_ms: 100,
            retarget_debounce_ms: 80,
            refresh_after_retarget_ms: 220,
        }
    }
}

impl SwitcherSettings {
    pub fn step_interval(&self) -> Duration { Duration::from_millis(self.step_interval_ms) }

    pub fn retarget_debounce(&self) -> Duration { Duration::from_millis(self.retarget_debounce_ms) }

    pub fn refresh_after_retarget(&self) -> Duration {
        Duration::from_millis(self.refresh_after_retarget_ms)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    /// Longest edge requested from the backend, before `scale`.
    pub max_dimension: f64,
    pub scale: f64,
    /// Leading priority slots that are refetched even when cached.
    pub urgent_slots: usize,
    pub cache_capacity: usize,
    pub workers: usize,
    /// Gray level (0..=1) behind every composited thumbnail.
    pub background_shade: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            max_dimension: 560.0,
            scale: 2.0,
            urgent_slots: 3,
            cache_capacity: 80,
            workers: 2,
            background_shade: 0.06,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LiveSettings {
    pub max_dimension: f64,
    pub scale: f64,
    /// Publish cap, independent of how fast the backend delivers.
    pub max_fps: u32,
    /// Frames discarded after a retarget before the stream is trusted.
    pub settle_frames: u32,
    pub trim_dark_edges: bool,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            max_dimension: 480.0,
            scale: 2.0,
            max_fps: 10,
            settle_frames: 3,
            trim_dark_edges: true,
        }
    }
}

impl LiveSettings {
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CardSettings {
    pub height: f64,
    pub label_bar: f64,
    pub min_width: f64,
    pub max_width: f64,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            height: 160.0,
            label_bar: 28.0,
            min_width: 140.0,
            max_width: 320.0,
        }
    }
}

impl Config {
    pub fn read(path: &Path) -> Result<Config, ConfigError> {
        let buf = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::parse(&buf).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Reads the config at `path`, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::read(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Config::default())
            }
            other => other,
        }
    }

    pub fn parse(buf: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(buf).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if s.capture.cache_capacity == 0 {
            return invalid("capture.cache_capacity", "must be at least 1");
        }
        if s.capture.workers == 0 {
            return invalid("capture.workers", "must be at least 1");
        }
        if !(s.capture.max_dimension > 0.0) || !(s.live.max_dimension > 0.0) {
            return invalid("max_dimension", "must be positive");
        }
        if !(s.capture.scale > 0.0) || !(s.live.scale > 0.0) {
            return invalid("scale", "must be positive");
        }
        if !(0.0..=1.0).contains(&s.capture.background_shade) {
            return invalid("capture.background_shade", "must be within 0..=1");
        }
        if s.live.max_fps == 0 {
            return invalid("live.max_fps", "must be at least 1");
        }
        if s.card.label_bar >= s.card.height {
            return invalid("card.label_bar", "must be smaller than card.height");
        }
        if s.card.min_width > s.card.max_width {
            return invalid("card.min_width", "must not exceed card.max_width");
        }
        Ok(())
    }
}
