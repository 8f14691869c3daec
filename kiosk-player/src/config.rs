//! Configuration management for kiosk-player
//!
//! Bootstrap configuration comes from, highest priority first:
//! 1. Command-line arguments (--port, --bind)
//! 2. Environment variables (KIOSK_PORT, KIOSK_BIND, FFPROBE_PATH, KIOSK_PUBLIC_URL)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing discovered config file is not an error; a missing file the
//! operator named explicitly is.

use crate::error::{Error, Result};
use crate::playback::delay::{
    DelayPolicy, DEFAULT_FALLBACK_MS, DEFAULT_IMAGE_MS, DEFAULT_PROBE_TIMEOUT_MS,
    DISPLAY_TRANSITION_MS,
};
use kiosk_common::config::{load_toml, ConfigLocation};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application name used for config discovery (`~/.config/kiosk/config.toml`)
pub const APP_NAME: &str = "kiosk";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "KIOSK_CONFIG";

/// Environment variable overriding the ffprobe executable
pub const FFPROBE_ENV_VAR: &str = "FFPROBE_PATH";

/// Environment variable overriding the public base URL of uploaded files
pub const PUBLIC_URL_ENV_VAR: &str = "KIOSK_PUBLIC_URL";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind the HTTP server to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub uploads: UploadsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Scheduler timing, all in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_image_ms")]
    pub image_default_ms: u64,

    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,

    /// Total delay for a video whose length could not be probed
    #[serde(default = "default_fallback_ms")]
    pub fallback_video_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Duration probe settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
}

/// Display event stream settings
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Events buffered per client before it lags
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

/// Uploaded file storage
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Folder for uploaded files, emptied at startup
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,

    /// Base URL display clients use to reach this server; empty means
    /// relative `/uploads/...` sources
    #[serde(default)]
    pub public_url: String,

    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "kiosk_player=info,tower_http=info".to_string()
}

fn default_image_ms() -> u64 {
    DEFAULT_IMAGE_MS
}

fn default_transition_ms() -> u64 {
    DISPLAY_TRANSITION_MS
}

fn default_fallback_ms() -> u64 {
    DEFAULT_FALLBACK_MS
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_channel_capacity() -> usize {
    100
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_mb() -> u64 {
    256
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
            probe: ProbeConfig::default(),
            events: EventsConfig::default(),
            uploads: UploadsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            image_default_ms: default_image_ms(),
            transition_ms: default_transition_ms(),
            fallback_video_ms: default_fallback_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            public_url: String::new(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl UploadsConfig {
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl PlaybackConfig {
    /// Delay policy for the scheduler
    pub fn delay_policy(&self) -> DelayPolicy {
        DelayPolicy {
            image_default: Duration::from_millis(self.image_default_ms),
            transition: Duration::from_millis(self.transition_ms),
            fallback_video: Duration::from_millis(self.fallback_video_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl EventsConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl TomlConfig {
    /// Load configuration from a resolved location.
    ///
    /// - `None`: built-in defaults
    /// - discovered file that vanished: built-in defaults
    /// - explicit file that is missing or invalid: error
    pub fn load(location: Option<&ConfigLocation>) -> Result<Self> {
        let config = match location {
            None => Self::default(),
            Some(location) if !location.explicit && !location.path.exists() => Self::default(),
            Some(location) => load_toml::<Self>(&location.path)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides that have no CLI flag
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(FFPROBE_ENV_VAR) {
            if !path.trim().is_empty() {
                self.probe.ffprobe_path = PathBuf::from(path);
            }
        }
        if let Ok(url) = std::env::var(PUBLIC_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                self.uploads.public_url = url.trim().to_string();
            }
        }
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("playback.image_default_ms", self.playback.image_default_ms),
            ("playback.fallback_video_ms", self.playback.fallback_video_ms),
            ("playback.probe_timeout_ms", self.playback.probe_timeout_ms),
            ("events.keep_alive_secs", self.events.keep_alive_secs),
            ("uploads.max_upload_mb", self.uploads.max_upload_mb),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", key)));
            }
        }

        if self.events.channel_capacity == 0 {
            return Err(Error::Config(
                "events.channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.bind_addr.parse::<IpAddr>().is_err() {
            return Err(Error::Config(format!(
                "bind_addr '{}' is not an IP address",
                self.bind_addr
            )));
        }

        Ok(())
    }
}
