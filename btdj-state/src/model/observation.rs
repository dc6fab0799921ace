//! Observations handed from sources to the reconciler

use serde::{Deserialize, Serialize};

use super::{DeviceId, PlaybackState, TrackMetadata};

/// Kind of source that produced an observation
///
/// The ordering is the static priority: event-driven bus first, polled
/// tools second, the binary audio-activity flag last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// Push notifications from the platform audio-control bus
    Bus,
    /// Periodic shell-out to an external utility
    Polling,
    /// Audio-stream inspection reporting only "audio flowing or not"
    Activity,
}

impl SourceKind {
    /// Whether this kind carries structured metadata
    pub fn is_structured(self) -> bool {
        matches!(self, SourceKind::Bus | SourceKind::Polling)
    }
}

/// One entry of a connected-device enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        Self {
            id: id.into(),
            name: (!name.is_empty()).then(|| name.to_string()),
        }
    }
}

/// An unvalidated track/state observation from one source
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Device the observation is about; `None` means the current device
    pub device: Option<DeviceId>,
    pub source: SourceKind,
    pub track: Option<TrackMetadata>,
    pub state: Option<PlaybackState>,
}

impl Candidate {
    pub fn new(device: Option<DeviceId>, source: SourceKind) -> Self {
        Self {
            device,
            source,
            track: None,
            state: None,
        }
    }

    pub fn with_track(mut self, track: TrackMetadata) -> Self {
        self.track = Some(track);
        self
    }

    pub fn with_state(mut self, state: PlaybackState) -> Self {
        self.state = Some(state);
        self
    }

    /// Whether the candidate carries anything the reconciler could accept
    pub fn is_empty(&self) -> bool {
        self.track.as_ref().map_or(true, |t| !t.is_valid())
            && self.state.map_or(true, |s| !s.is_known())
    }
}

/// Everything a source can tell the reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Candidate track and/or playback state
    Candidate(Candidate),
    /// Binary audio-activity flag; `None` device means the current device
    Activity {
        device: Option<DeviceId>,
        active: bool,
    },
    /// Full enumeration of the devices connected right now
    Devices(Vec<DeviceInfo>),
    /// Explicit evidence that a device went away
    Disconnected(DeviceId),
    /// The event-driven source established its registration for a device
    BusAttached(DeviceId),
    /// Platform-wide availability of the event-driven source
    BusAvailability(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_priority_order() {
        assert!(SourceKind::Bus < SourceKind::Polling);
        assert!(SourceKind::Polling < SourceKind::Activity);
        assert!(!SourceKind::Activity.is_structured());
    }

    #[test]
    fn test_candidate_is_empty() {
        let candidate = Candidate::new(None, SourceKind::Polling);
        assert!(candidate.is_empty());

        let candidate = candidate.with_state(PlaybackState::Unknown);
        assert!(candidate.is_empty());

        let candidate = Candidate::new(None, SourceKind::Polling)
            .with_track(TrackMetadata::new("Artist", "Title"));
        assert!(!candidate.is_empty());
    }

    #[test]
    fn test_device_info_named_trims() {
        let info = DeviceInfo::named("AA:BB:CC:DD:EE:FF", "  Pixel 8 ");
        assert_eq!(info.name.as_deref(), Some("Pixel 8"));
        assert_eq!(DeviceInfo::named("AA:BB:CC:DD:EE:FF", " ").name, None);
    }
}
