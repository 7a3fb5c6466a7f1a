//! Configuration system (layered: code > env > config file).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThinkstreamError};
use crate::transport::FrameMode;

/// Reveal-rate settings for the typewriter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub chars_per_second: f64,
    /// Redraw cap. The frame budget is `1 / max_fps` seconds.
    pub max_fps: u32,
    /// Initial reduced-motion preference.
    pub reduced_motion: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 60.0,
            max_fps: 60,
            reduced_motion: false,
        }
    }
}

impl RevealConfig {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }
}

/// Timing policy for the thinking overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkingConfig {
    /// Delay between `set_visible(false)` and the actual hide.
    pub hide_delay_ms: u64,
    /// Time the overlay must be visible before cancel is offered.
    pub cancel_delay_ms: u64,
    /// How long the finished timeline stays up after a turn completes.
    pub completion_delay_ms: u64,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 600,
            cancel_delay_ms: 800,
            completion_delay_ms: 1200,
        }
    }
}

impl ThinkingConfig {
    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    pub fn cancel_delay(&self) -> Duration {
        Duration::from_millis(self.cancel_delay_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkstreamConfig {
    /// Chat endpoint that answers with an event stream.
    pub endpoint: Option<String>,
    /// Bearer token sent with each request.
    pub api_key: Option<String>,
    pub frame_mode: FrameMode,
    /// Caller-level timeout for a whole turn.
    pub request_timeout_secs: Option<u64>,
    pub reveal: RevealConfig,
    pub thinking: ThinkingConfig,
}

impl ThinkstreamConfig {
    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// `~/.thinkstream/config.toml`.
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".thinkstream"))
            .unwrap_or_else(|| PathBuf::from(".thinkstream"))
            .join("config.toml")
    }

    /// Load the default config file if present, then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.with_env()
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Apply `THINKSTREAM_*` variables (and a `.env` file, if any).
    pub fn with_env(self) -> Result<Self> {
        let _ = dotenvy::dotenv(); // optional .env
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("THINKSTREAM_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("THINKSTREAM_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(mode) = lookup("THINKSTREAM_FRAME_MODE") {
            self.frame_mode = mode.parse().map_err(|_| {
                ThinkstreamError::Configuration(format!("unknown frame mode '{mode}'"))
            })?;
        }
        if let Some(cps) = lookup("THINKSTREAM_CHARS_PER_SECOND") {
            self.reveal.chars_per_second = cps.parse().map_err(|_| {
                ThinkstreamError::Configuration(format!("invalid chars per second '{cps}'"))
            })?;
        }
        if let Some(flag) = lookup("THINKSTREAM_REDUCED_MOTION") {
            self.reveal.reduced_motion = parse_flag(&flag)?;
        }
        if let Some(secs) = lookup("THINKSTREAM_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(secs.parse().map_err(|_| {
                ThinkstreamError::Configuration(format!("invalid timeout '{secs}'"))
            })?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.reveal.chars_per_second.is_finite() && self.reveal.chars_per_second > 0.0) {
            return Err(ThinkstreamError::Configuration(
                "chars_per_second must be a positive number".into(),
            ));
        }
        if self.reveal.max_fps == 0 {
            return Err(ThinkstreamError::Configuration(
                "max_fps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The configured endpoint, or a configuration error.
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .ok_or_else(|| ThinkstreamError::Configuration("no endpoint configured".into()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ThinkstreamError::Configuration(format!(
            "invalid boolean '{other}'"
        ))),
    }
}
