use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btdj_state::{DeviceId, Observation, SourceKind};
use tracing::trace;

use crate::command::CommandRunner;
use crate::error::{Result, SourceError};
use crate::parser::pactl::parse_activity;
use crate::source::MetadataSource;

const PROGRAM: &str = "pactl";

/// Audio activity of Bluetooth streams via `pactl list short <kind>`
///
/// Reports only "audio flowing or not", never track metadata.
pub struct PactlActivity {
    runner: Arc<dyn CommandRunner>,
    listings: Vec<&'static str>,
}

impl PactlActivity {
    /// Inspect both sources (phone streaming in) and sinks (headphones)
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            listings: vec!["sources", "sinks"],
        }
    }

    pub fn sources_only(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            listings: vec!["sources"],
        }
    }
}

#[async_trait]
impl MetadataSource for PactlActivity {
    fn name(&self) -> &str {
        "pactl"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Activity
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        // Device order of first appearance, active if any stream runs
        let mut order: Vec<DeviceId> = Vec::new();
        let mut active: HashMap<DeviceId, bool> = HashMap::new();
        let mut last_error = None;
        let mut succeeded = false;

        for listing in self.listings.iter().copied() {
            let output = match self.runner.run(PROGRAM, &["list", "short", listing]).await {
                Ok(output) => output,
                Err(e) => {
                    trace!(listing, error = %e, "pactl listing failed");
                    last_error = Some(e);
                    continue;
                }
            };
            succeeded = true;

            for stream in parse_activity(&output) {
                let entry = active.entry(stream.device.clone()).or_insert_with(|| {
                    order.push(stream.device.clone());
                    false
                });
                *entry |= stream.active;
            }
        }

        if !succeeded {
            return Err(last_error.unwrap_or_else(|| SourceError::Unavailable(PROGRAM.into())));
        }

        Ok(order
            .into_iter()
            .map(|device| {
                let active = active.get(&device).copied().unwrap_or(false);
                Observation::Activity {
                    device: Some(device),
                    active,
                }
            })
            .collect())
    }
}
