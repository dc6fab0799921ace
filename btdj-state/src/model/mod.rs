//! Model types for btdj-state

mod device_id;
mod observation;
mod playback_state;
mod track_metadata;

pub use device_id::DeviceId;
pub use observation::{Candidate, DeviceInfo, Observation, SourceKind};
pub use playback_state::PlaybackState;
pub use track_metadata::{is_placeholder, TrackMetadata};
