//! Error types for btdj-speech

use std::time::Duration;

/// Result type for speech operations
pub type Result<T> = std::result::Result<T, SpeechError>;

/// Errors that can occur while rendering speech
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The speech program is missing or cannot run
    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but reported failure
    #[error("{engine} failed: {reason}")]
    RenderFailed {
        /// Engine name
        engine: String,
        /// What went wrong
        reason: String,
    },

    /// Rendering did not finish in time
    #[error("{engine} timed out after {after:?}")]
    Timeout {
        /// Engine name
        engine: String,
        /// The timeout that expired
        after: Duration,
    },

    /// Nothing to say
    #[error("Empty speech text")]
    EmptyText,

    /// The arbiter worker was already started
    #[error("Output arbiter worker is already running")]
    AlreadyRunning,

    /// The arbiter worker is no longer running
    #[error("Output arbiter is shut down")]
    ShutDown,

    /// I/O error while talking to the engine process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
