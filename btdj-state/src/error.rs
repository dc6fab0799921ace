//! Error types for btdj-state

/// Result type for btdj-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while reconciling state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}
