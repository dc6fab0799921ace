//! Now-playing state for Bluetooth audio devices
//!
//! This crate owns everything between raw source observations and the
//! canonical event stream:
//!
//! ```text
//! Sources → Observation → Reconciler → DeviceStore (queries)
//!                                    → EventBus    (MonitorEvent stream)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use btdj_state::prelude::*;
//!
//! # fn main() -> btdj_state::Result<()> {
//! let store = DeviceStore::new();
//! let bus = Arc::new(EventBus::default());
//! let reconciler = Reconciler::new(store.clone(), bus, ReconcilerConfig::default())?;
//!
//! let candidate = Candidate::new(Some(DeviceId::new("aa:bb:cc:dd:ee:ff")), SourceKind::Polling)
//!     .with_track(TrackMetadata::new("Test Artist", "Test Song"));
//! let events = reconciler.apply(Observation::Candidate(candidate), Instant::now());
//!
//! assert_eq!(events.len(), 2);
//! assert_eq!(
//!     store.current_track(&DeviceId::new("AA:BB:CC:DD:EE:FF")).map(|t| t.title),
//!     Some("Test Song".to_string())
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod store;

pub use config::ReconcilerConfig;
pub use error::{Result, StateError};
pub use event::{EventBus, EventStream, MonitorEvent};
pub use lifecycle::LifecycleTracker;
pub use model::{
    is_placeholder, Candidate, DeviceId, DeviceInfo, Observation, PlaybackState, SourceKind,
    TrackMetadata,
};
pub use reconciler::Reconciler;
pub use store::{DeviceRecord, DeviceSnapshot, DeviceStore, DeviceTable};

/// Commonly used types
pub mod prelude {
    pub use crate::config::ReconcilerConfig;
    pub use crate::event::{EventBus, EventStream, MonitorEvent};
    pub use crate::model::{
        Candidate, DeviceId, DeviceInfo, Observation, PlaybackState, SourceKind, TrackMetadata,
    };
    pub use crate::reconciler::Reconciler;
    pub use crate::store::DeviceStore;
}
