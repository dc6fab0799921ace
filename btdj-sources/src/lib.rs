//! # btdj-sources
//!
//! Everything that produces [`Observation`]s for the reconciler:
//!
//! - [`MetadataSource`]: the polymorphic source interface
//! - [`sources`]: polling sources over `bluetoothctl`, `playerctl`, `pactl`
//!   and arbitrary key/value commands
//! - [`BusEventSource`]: the event-driven source behind a [`BusAdapter`]
//! - [`parser`]: one pure parser per tool output format
//! - [`PollingScheduler`]: presence and metadata loops with per-cycle merge
//!
//! Sources never fail the caller. Missing tools, hangs and garbage output
//! all end up as "no candidate" for that cycle.
//!
//! [`Observation`]: btdj_state::Observation

pub mod bus;
pub mod command;
pub mod error;
pub mod parser;
pub mod scheduler;
pub mod source;
pub mod sources;

pub use bus::{BusAdapter, BusEventSource, BusNotification};
pub use command::{CommandRunner, ProcessRunner};
pub use error::{Result, SourceError};
pub use parser::bus::{BusProperties, BusValue};
pub use parser::ParsedPlayer;
pub use scheduler::{PollingScheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};
pub use source::{MetadataSource, SourceRole};
