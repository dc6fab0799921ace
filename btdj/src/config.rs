//! Monitor configuration
//!
//! Loaded from JSON. Every field is optional in the file; missing fields
//! take their defaults. Durations are written in milliseconds.
//!
//! ```json
//! {
//!   "metadata_interval_ms": 3000,
//!   "grace_window_ms": 5000,
//!   "speech": { "command": ["espeak-ng", "-s", "160"] },
//!   "commentary": { "endpoint": "http://localhost:11434/api/generate" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use btdj_sources::SchedulerConfig;
use btdj_speech::ArbiterConfig;
use btdj_state::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "BTDJ_CONFIG";

/// Top-level configuration of a [`Monitor`](crate::Monitor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval of the connected-device check
    /// Default: 2 seconds
    #[serde(rename = "presence_interval_ms", with = "duration_ms")]
    pub presence_interval: Duration,

    /// Interval of the track/state polling cycle
    /// Default: 3 seconds
    #[serde(rename = "metadata_interval_ms", with = "duration_ms")]
    pub metadata_interval: Duration,

    /// Upper bound for one source query
    /// Default: 5 seconds
    #[serde(rename = "source_timeout_ms", with = "duration_ms")]
    pub source_timeout: Duration,

    /// Delay after a failed polling cycle
    /// Default: 5 seconds
    #[serde(rename = "error_backoff_ms", with = "duration_ms")]
    pub error_backoff: Duration,

    /// Silence tolerated around track transitions before reporting a stop
    /// Default: 5 seconds
    #[serde(rename = "grace_window_ms", with = "duration_ms")]
    pub grace_window: Duration,

    /// Reconciler tick
    /// Default: 500 milliseconds
    #[serde(rename = "tick_interval_ms", with = "duration_ms")]
    pub tick_interval: Duration,

    /// Minimum gap between two spoken comments
    /// Default: 10 seconds
    #[serde(rename = "comment_throttle_ms", with = "duration_ms")]
    pub comment_throttle: Duration,

    /// How long to wait for generated commentary
    /// Default: 15 seconds
    #[serde(rename = "commentary_timeout_ms", with = "duration_ms")]
    pub commentary_timeout: Duration,

    /// Pending speech requests kept besides the one being spoken
    /// Default: 2
    pub speech_queue_capacity: usize,

    /// Events buffered per subscriber before it starts lagging
    /// Default: 256
    pub event_buffer: usize,

    /// Observations buffered between sources and the reconciler
    /// Default: 256
    pub observation_buffer: usize,

    pub sources: SourcesConfig,
    pub speech: SpeechConfig,
    pub commentary: CommentaryConfig,
}

/// Which command-line sources to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// `bluetoothctl` device enumeration and media player
    pub bluetoothctl: bool,
    pub playerctl: bool,
    /// Restrict `playerctl` to one player name
    pub playerctl_player: Option<String>,
    /// `pactl` stream activity
    pub pactl: bool,
    /// Extra commands printing `key: value` metadata
    pub commands: Vec<CommandSourceConfig>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            bluetoothctl: true,
            playerctl: true,
            playerctl_player: None,
            pactl: true,
            commands: Vec::new(),
        }
    }
}

/// A `key: value` metadata command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSourceConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Device the output belongs to when it does not say
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak out loud; when off, comments only go to the log
    pub enabled: bool,
    /// Program and leading arguments; the text is appended
    pub command: Vec<String>,
    /// Used when the primary command fails
    pub fallback_command: Option<Vec<String>>,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec!["espeak-ng".to_string()],
            fallback_command: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentaryConfig {
    pub enabled: bool,
    /// Text generation endpoint; without one only local phrases are used
    pub endpoint: Option<String>,
    pub model: String,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            model: "llama3.2".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        let reconciler = ReconcilerConfig::default();
        Self {
            presence_interval: scheduler.presence_interval,
            metadata_interval: scheduler.metadata_interval,
            source_timeout: scheduler.source_timeout,
            error_backoff: scheduler.error_backoff,
            grace_window: reconciler.grace_window,
            tick_interval: reconciler.tick_interval,
            comment_throttle: Duration::from_secs(10),
            commentary_timeout: Duration::from_secs(15),
            speech_queue_capacity: ArbiterConfig::default().queue_capacity,
            event_buffer: 256,
            observation_buffer: reconciler.observation_buffer,
            sources: SourcesConfig::default(),
            speech: SpeechConfig::default(),
            commentary: CommentaryConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Check the configuration for values the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("presence_interval_ms", self.presence_interval),
            ("metadata_interval_ms", self.metadata_interval),
            ("source_timeout_ms", self.source_timeout),
            ("commentary_timeout_ms", self.commentary_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }

        let sizes = [
            ("speech_queue_capacity", self.speech_queue_capacity),
            ("event_buffer", self.event_buffer),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }

        self.reconciler_config().validate()?;

        if self.speech.enabled && self.speech.command.is_empty() {
            return Err(ConfigError::Invalid(
                "speech.command must name a program".to_string(),
            ));
        }
        if let Some(endpoint) = &self.commentary.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "commentary.endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
        }
        for command in &self.sources.commands {
            if command.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "command source '{}' has no program",
                    command.name
                )));
            }
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            presence_interval: self.presence_interval,
            metadata_interval: self.metadata_interval,
            source_timeout: self.source_timeout,
            error_backoff: self.error_backoff,
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            grace_window: self.grace_window,
            tick_interval: self.tick_interval,
            observation_buffer: self.observation_buffer,
        }
    }

    pub fn arbiter_config(&self) -> ArbiterConfig {
        ArbiterConfig::default().with_queue_capacity(self.speech_queue_capacity)
    }

    /// Default location of the config file
    ///
    /// `$BTDJ_CONFIG` if set, otherwise `<config dir>/btdj/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::config_dir().map(|dir| dir.join("btdj").join("config.json")),
        }
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`, or return defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
