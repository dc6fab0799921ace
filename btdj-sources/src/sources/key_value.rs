use std::sync::Arc;

use async_trait::async_trait;
use btdj_state::{DeviceId, Observation, SourceKind};

use crate::command::CommandRunner;
use crate::error::Result;
use crate::parser::key_value::parse;
use crate::source::MetadataSource;

/// Any command that prints `key: value` metadata lines
///
/// Useful for helper scripts. A `device:` line in the output wins over the
/// configured device; with neither, candidates target the current device.
pub struct KeyValueCommandSource {
    name: String,
    runner: Arc<dyn CommandRunner>,
    program: String,
    args: Vec<String>,
    device: Option<DeviceId>,
}

impl KeyValueCommandSource {
    pub fn new(
        name: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            runner,
            program: program.into(),
            args,
            device: None,
        }
    }

    pub fn for_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }
}

#[async_trait]
impl MetadataSource for KeyValueCommandSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Polling
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let output = self.runner.run(&self.program, &args).await?;

        let Some(mut player) = parse(&output) else {
            return Ok(Vec::new());
        };
        if player.device.is_none() {
            player.device = self.device.clone();
        }

        Ok(player
            .into_candidate(SourceKind::Polling)
            .map(Observation::Candidate)
            .into_iter()
            .collect())
    }
}
