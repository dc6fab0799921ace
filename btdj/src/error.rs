use std::path::PathBuf;

use thiserror::Error;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Speech error: {0}")]
    Speech(#[from] btdj_speech::SpeechError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Commentary error: {0}")]
    Commentary(#[from] crate::commentary::CommentaryError),

    #[error("Monitoring is already running")]
    AlreadyRunning,

    #[error("Monitoring is not running")]
    NotRunning,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid reconciler settings: {0}")]
    Reconciler(#[from] btdj_state::StateError),
}
