use std::sync::Arc;

use async_trait::async_trait;
use btdj_state::{Observation, SourceKind};
use tracing::trace;

use crate::command::CommandRunner;
use crate::error::{Result, SourceError};
use crate::parser::playerctl::{parse_metadata, parse_status};
use crate::parser::ParsedPlayer;
use crate::source::MetadataSource;

const PROGRAM: &str = "playerctl";

/// MPRIS metadata and status via `playerctl`
///
/// playerctl cannot tell which Bluetooth device a player belongs to, so its
/// candidates target the current device.
pub struct Playerctl {
    runner: Arc<dyn CommandRunner>,
    player: Option<String>,
}

impl Playerctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            player: None,
        }
    }

    /// Restrict queries to one player name (`--player=<name>`)
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    async fn run(&self, command: &str) -> Result<String> {
        match &self.player {
            Some(player) => {
                let selector = format!("--player={}", player);
                self.runner.run(PROGRAM, &[selector.as_str(), command]).await
            }
            None => self.runner.run(PROGRAM, &[command]).await,
        }
    }
}

#[async_trait]
impl MetadataSource for Playerctl {
    fn name(&self) -> &str {
        "playerctl"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Polling
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        let metadata = match self.run("metadata").await {
            Ok(metadata) => metadata,
            Err(SourceError::CommandFailed { stderr, .. }) if stderr.contains("No player") => {
                trace!("No MPRIS players running");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let mut player = parse_metadata(&metadata).unwrap_or_default();

        // Status is independent; a failure here keeps the metadata
        match self.run("status").await {
            Ok(status) => player.state = parse_status(&status),
            Err(e) => trace!(error = %e, "playerctl status failed"),
        }

        Ok(into_observation(player))
    }
}

fn into_observation(player: ParsedPlayer) -> Vec<Observation> {
    player
        .into_candidate(SourceKind::Polling)
        .map(Observation::Candidate)
        .into_iter()
        .collect()
}
