use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_IMAGE_FOLDER: &str = "img";
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_POST_CLICK_DELAY: f64 = 2.6;
pub const DEFAULT_IDLE_DELAY: f64 = 0.5;
pub const DEFAULT_SMOOTH_DURATION: f64 = 0.5;
pub const DEFAULT_INSTANT_DELAY: f64 = 0.1;
pub const DEFAULT_STOP_KEY: &str = "esc";

/// Longest delay accepted from the settings file or the console, in seconds.
pub const MAX_DELAY_SECONDS: f64 = 3600.0;

/// User configuration stored in `image_clicker.yaml`.
///
/// Mirrors the two sections of the settings file: folder paths and the
/// tunables the loop reads every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub settings: ClickerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_image_folder")]
    pub image_folder: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            image_folder: default_image_folder(),
        }
    }
}

/// How the pointer travels to a match before clicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMode {
    Instant,
    #[default]
    Smooth,
}

impl FromStr for MoveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instant" => Ok(MoveMode::Instant),
            "smooth" => Ok(MoveMode::Smooth),
            other => Err(format!("unknown move mode '{}'", other)),
        }
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveMode::Instant => write!(f, "instant"),
            MoveMode::Smooth => write!(f, "smooth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

/// Settings snapshot read by the loop at the start of every cycle.
///
/// Delays are stored in seconds, like the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickerSettings {
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_post_click_delay")]
    pub post_click_delay: f64,

    #[serde(default = "default_idle_delay")]
    pub idle_delay: f64,

    #[serde(default)]
    pub move_mode: MoveMode,

    #[serde(default = "default_smooth_duration")]
    pub smooth_duration: f64,

    /// Pause between the instant jump and the click.
    #[serde(default = "default_instant_delay")]
    pub instant_delay: f64,

    /// Global key that stops a running loop, e.g. `esc`, `f8` or `q`.
    #[serde(default = "default_stop_key")]
    pub stop_key: String,

    #[serde(default)]
    pub language: Language,
}

impl Default for ClickerSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            post_click_delay: DEFAULT_POST_CLICK_DELAY,
            idle_delay: DEFAULT_IDLE_DELAY,
            move_mode: MoveMode::default(),
            smooth_duration: DEFAULT_SMOOTH_DURATION,
            instant_delay: DEFAULT_INSTANT_DELAY,
            stop_key: default_stop_key(),
            language: Language::default(),
        }
    }
}

impl ClickerSettings {
    /// Replace out-of-range values with their defaults.
    ///
    /// Returns the names of the fields that were reset so callers can log them.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut reset = Vec::new();

        if !(self.threshold.is_finite() && (0.0..=1.0).contains(&self.threshold)) {
            self.threshold = DEFAULT_THRESHOLD;
            reset.push("threshold");
        }
        if !is_valid_seconds(self.post_click_delay) {
            self.post_click_delay = DEFAULT_POST_CLICK_DELAY;
            reset.push("post_click_delay");
        }
        if !is_valid_seconds(self.idle_delay) {
            self.idle_delay = DEFAULT_IDLE_DELAY;
            reset.push("idle_delay");
        }
        if !is_valid_seconds(self.smooth_duration) {
            self.smooth_duration = DEFAULT_SMOOTH_DURATION;
            reset.push("smooth_duration");
        }
        if !is_valid_seconds(self.instant_delay) {
            self.instant_delay = DEFAULT_INSTANT_DELAY;
            reset.push("instant_delay");
        }
        if crate::services::hotkeys::parse_key(&self.stop_key).is_none() {
            self.stop_key = default_stop_key();
            reset.push("stop_key");
        }

        reset
    }

    pub fn post_click_delay(&self) -> Duration {
        seconds(self.post_click_delay)
    }

    pub fn idle_delay(&self) -> Duration {
        seconds(self.idle_delay)
    }

    pub fn smooth_duration(&self) -> Duration {
        seconds(self.smooth_duration)
    }

    pub fn instant_delay(&self) -> Duration {
        seconds(self.instant_delay)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn is_valid_seconds(value: f64) -> bool {
    (0.0..=MAX_DELAY_SECONDS).contains(&value)
}

fn default_image_folder() -> String {
    DEFAULT_IMAGE_FOLDER.to_string()
}

fn default_stop_key() -> String {
    DEFAULT_STOP_KEY.to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_post_click_delay() -> f64 {
    DEFAULT_POST_CLICK_DELAY
}

fn default_idle_delay() -> f64 {
    DEFAULT_IDLE_DELAY
}

fn default_smooth_duration() -> f64 {
    DEFAULT_SMOOTH_DURATION
}

fn default_instant_delay() -> f64 {
    DEFAULT_INSTANT_DELAY
}
