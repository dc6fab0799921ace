//! Reconciler configuration

use std::time::Duration;

use crate::error::{Result, StateError};

/// Timing knobs of the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How long an activity-only gap must last before it counts as stopped,
    /// measured from the later of the gap start and the last track change
    pub grace_window: Duration,

    /// Interval of the periodic tick that expires pending stops
    pub tick_interval: Duration,

    /// Capacity of the observation channel feeding the loop
    pub observation_buffer: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(5),
            tick_interval: Duration::from_millis(500),
            observation_buffer: 256,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_grace_window(mut self, grace_window: Duration) -> Self {
        self.grace_window = grace_window;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(StateError::Configuration(
                "tick_interval must be greater than 0".to_string(),
            ));
        }
        if self.observation_buffer == 0 {
            return Err(StateError::Configuration(
                "observation_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.grace_window, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let config = ReconcilerConfig::default().with_tick_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_grace_is_allowed() {
        let config = ReconcilerConfig::default().with_grace_window(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
