//! Spoken commentary on what is playing
//!
//! [`CommentaryService`] watches the canonical event stream. For events on
//! the current device it asks a [`CommentaryGenerator`] for a line, falls
//! back to [`FallbackPhrases`] when that fails, and hands the text to the
//! output arbiter.

mod http;
mod phrases;
mod service;

use async_trait::async_trait;
use btdj_state::{DeviceId, MonitorEvent, PlaybackState, TrackMetadata};

pub use http::HttpCommentaryGenerator;
pub use phrases::FallbackPhrases;
pub use service::{CommentaryService, CommentaryStats};

/// Errors from a commentary generator
#[derive(Debug, thiserror::Error)]
pub enum CommentaryError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned HTTP {0}")]
    Status(u16),

    #[error("Backend returned no text")]
    Empty,
}

/// What happened, from the listener's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentaryTrigger {
    TrackChanged,
    DeviceConnected,
    Paused,
    Stopped,
    Resumed,
}

impl CommentaryTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentaryTrigger::TrackChanged => "track_changed",
            CommentaryTrigger::DeviceConnected => "device_connected",
            CommentaryTrigger::Paused => "paused",
            CommentaryTrigger::Stopped => "stopped",
            CommentaryTrigger::Resumed => "resumed",
        }
    }
}

/// Everything a generator gets to work with
#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryContext {
    pub trigger: CommentaryTrigger,
    pub device: DeviceId,
    pub device_name: Option<String>,
    pub track: Option<TrackMetadata>,
    pub previous_track: Option<TrackMetadata>,
}

impl CommentaryContext {
    /// Build the context for an event, or `None` if the event is not worth
    /// talking about
    ///
    /// Comments are made on track changes, connections, pausing or stopping
    /// a playing device, and resuming a paused or stopped one.
    pub fn from_event(event: &MonitorEvent, device_name: Option<String>) -> Option<Self> {
        let (trigger, track, previous_track) = match event {
            MonitorEvent::TrackChanged {
                current, previous, ..
            } => (
                CommentaryTrigger::TrackChanged,
                Some(current.clone()),
                previous.clone(),
            ),
            MonitorEvent::DeviceConnected { .. } => (CommentaryTrigger::DeviceConnected, None, None),
            MonitorEvent::PlaybackStateChanged {
                current,
                previous,
                track,
                ..
            } => {
                let trigger = match (previous, current) {
                    (PlaybackState::Playing, PlaybackState::Paused) => CommentaryTrigger::Paused,
                    (PlaybackState::Playing, PlaybackState::Stopped) => CommentaryTrigger::Stopped,
                    (PlaybackState::Paused | PlaybackState::Stopped, PlaybackState::Playing) => {
                        CommentaryTrigger::Resumed
                    }
                    _ => return None,
                };
                (trigger, track.clone(), None)
            }
            MonitorEvent::DeviceDisconnected { .. } => return None,
        };

        let device_name = match event {
            MonitorEvent::DeviceConnected { name: Some(name), .. } => Some(name.clone()),
            _ => device_name,
        };

        Some(Self {
            trigger,
            device: event.device().clone(),
            device_name,
            track,
            previous_track,
        })
    }

    /// Device name if known, otherwise its address
    pub fn device_label(&self) -> &str {
        self.device_name.as_deref().unwrap_or(self.device.as_str())
    }
}

/// Produces a short line of commentary
#[async_trait]
pub trait CommentaryGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, context: &CommentaryContext) -> Result<String, CommentaryError>;
}
