//! # btdj
//!
//! A radio-DJ for your Bluetooth speaker. btdj watches what the connected
//! Bluetooth audio device is playing, reconciles the noisy signals of
//! several tools into one clean event stream, and talks about the music.
//!
//! ```rust,no_run
//! use btdj::{Monitor, MonitorConfig, MonitorEvent};
//!
//! #[tokio::main]
//! async fn main() -> btdj::Result<()> {
//!     btdj::logging::init_logging_from_env().ok();
//!
//!     let monitor = Monitor::new(MonitorConfig::load()?)?;
//!     let mut events = monitor.subscribe();
//!     monitor.start_monitoring().await?;
//!
//!     while let Some(event) = events.next().await {
//!         if let MonitorEvent::TrackChanged { current, .. } = event {
//!             tracing::info!(artist = %current.artist, title = %current.title, "Now playing");
//!         }
//!     }
//!
//!     monitor.stop_monitoring().await
//! }
//! ```
//!
//! The building blocks live in their own crates and are re-exported here:
//! [`btdj_state`] (reconciler and store), [`btdj_sources`] (sources and
//! scheduler) and [`btdj_speech`] (output arbiter).

pub mod commentary;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;

pub use commentary::{
    CommentaryContext, CommentaryError, CommentaryGenerator, CommentaryService, CommentaryTrigger,
    FallbackPhrases, HttpCommentaryGenerator,
};
pub use config::{MonitorConfig, CONFIG_ENV};
pub use error::{ConfigError, MonitorError, Result};
pub use monitor::{Monitor, MonitorBuilder};

pub use btdj_state::{
    DeviceId, DeviceInfo, EventStream, MonitorEvent, PlaybackState, TrackMetadata,
};

pub use btdj_sources;
pub use btdj_speech;
pub use btdj_state;
