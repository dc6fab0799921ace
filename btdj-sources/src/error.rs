//! Error types for the btdj-sources crate.

use std::time::Duration;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors a metadata source can hit while querying
///
/// None of these are fatal; `MetadataSource::poll` logs them and reports
/// "no candidate" instead.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The external tool or bus is missing or refused to start
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// An external call did not finish in time
    #[error("{program} timed out after {after:?}")]
    Timeout {
        /// The program or bus call that hung
        program: String,
        /// The timeout that expired
        after: Duration,
    },

    /// An external program exited unsuccessfully
    #[error("{program} exited with status {status:?}: {stderr}")]
    CommandFailed {
        /// The program that failed
        program: String,
        /// Exit code, if the process was not killed by a signal
        status: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// The event-driven bus reported an error
    #[error("Bus error: {0}")]
    Bus(String),

    /// The observation channel is gone; the consumer stopped
    #[error("Observation channel closed")]
    ChannelClosed,

    /// I/O error while talking to a child process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the error means the source cannot work at all right now
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}
