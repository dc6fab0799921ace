//! Latest-wins speech output for btdj
//!
//! Commentary is produced faster than it can be spoken whenever tracks are
//! skipped quickly. [`OutputArbiter`] keeps only the newest few requests
//! and speaks them one at a time through a [`SpeechEngine`], falling back
//! to a second engine when the first one fails.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use btdj_speech::{ArbiterConfig, CommandSpeechEngine, LogSpeechEngine, OutputArbiter};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> btdj_speech::Result<()> {
//! let arbiter = OutputArbiter::new(ArbiterConfig::default());
//! let cancel = CancellationToken::new();
//! let worker = arbiter.spawn(
//!     Arc::new(CommandSpeechEngine::new("espeak-ng")),
//!     Some(Arc::new(LogSpeechEngine)),
//!     cancel.clone(),
//! )?;
//!
//! arbiter.enqueue("Now playing Test Song by Test Artist")?;
//!
//! cancel.cancel();
//! let _ = worker.await;
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod engine;
pub mod error;
pub mod queue;

pub use arbiter::{ArbiterConfig, ArbiterStats, OutputArbiter};
pub use engine::{CommandSpeechEngine, LogSpeechEngine, SpeechEngine};
pub use error::{Result, SpeechError};
pub use queue::{LatestWinsQueue, SpeechRequest};
