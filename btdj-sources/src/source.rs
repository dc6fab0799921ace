//! The metadata source abstraction

use async_trait::async_trait;
use btdj_state::{Observation, SourceKind};
use tracing::{debug, warn};

use crate::error::{Result, SourceError};

/// Which scheduler loop drives a polling source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// Enumerates connected devices; runs on the fast presence cadence
    Presence,
    /// Reports track, state or activity; runs on the metadata cadence
    Metadata,
}

/// A producer of observations about connected devices and what they play
///
/// Implementations report recoverable conditions (missing binary, empty
/// output, malformed text) through `query`'s error or an empty result.
/// Callers that must never fail use [`MetadataSource::poll`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// How authoritative this source's observations are
    fn kind(&self) -> SourceKind;

    fn role(&self) -> SourceRole {
        SourceRole::Metadata
    }

    /// Query the source once
    async fn query(&self) -> Result<Vec<Observation>>;

    /// Query the source once, turning any failure into "no candidate"
    async fn poll(&self) -> Vec<Observation> {
        match self.query().await {
            Ok(observations) => observations,
            Err(SourceError::Unavailable(reason)) => {
                debug!(source = self.name(), %reason, "Source unavailable this cycle");
                Vec::new()
            }
            Err(e) => {
                warn!(source = self.name(), error = %e, "Source query failed");
                Vec::new()
            }
        }
    }
}
