//! Playback state enumeration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current playback state of a device
///
/// Transitions are total: any state may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing has been reported yet
    #[default]
    Unknown,
    /// Currently playing audio
    Playing,
    /// Playback is paused
    Paused,
    /// Playback is stopped
    Stopped,
    /// Fast-forwarding
    SeekingForward,
    /// Rewinding
    SeekingReverse,
}

impl PlaybackState {
    /// Parse from a free-text status string
    ///
    /// Handles the spellings the different tools use:
    /// - "playing" / "Playing"
    /// - "paused"
    /// - "stopped"
    /// - "forward-seek", "seeking forward", "fast-forward"
    /// - "reverse-seek", "seeking reverse", "rewind"
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "stopped" => PlaybackState::Stopped,
            "forward-seek" | "seeking forward" | "fast-forward" => PlaybackState::SeekingForward,
            "reverse-seek" | "seeking reverse" | "rewind" => PlaybackState::SeekingReverse,
            _ => PlaybackState::Unknown,
        }
    }

    /// Whether the state is anything other than `Unknown`
    pub fn is_known(self) -> bool {
        self != PlaybackState::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Unknown => "unknown",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::SeekingForward => "seeking forward",
            PlaybackState::SeekingReverse => "seeking reverse",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
