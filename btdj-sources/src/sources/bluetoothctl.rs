use std::sync::Arc;

use async_trait::async_trait;
use btdj_state::{Observation, SourceKind};

use crate::command::CommandRunner;
use crate::error::Result;
use crate::parser::bluetoothctl::{parse_devices, parse_player};
use crate::source::{MetadataSource, SourceRole};

const PROGRAM: &str = "bluetoothctl";

/// Connected-device enumeration via `bluetoothctl devices Connected`
pub struct BluetoothctlDevices {
    runner: Arc<dyn CommandRunner>,
}

impl BluetoothctlDevices {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl MetadataSource for BluetoothctlDevices {
    fn name(&self) -> &str {
        "bluetoothctl-devices"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Polling
    }

    fn role(&self) -> SourceRole {
        SourceRole::Presence
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        let output = self.runner.run(PROGRAM, &["devices", "Connected"]).await?;
        Ok(vec![Observation::Devices(parse_devices(&output))])
    }
}

/// Track and status of the default media player via `bluetoothctl player.show`
pub struct BluetoothctlPlayer {
    runner: Arc<dyn CommandRunner>,
}

impl BluetoothctlPlayer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl MetadataSource for BluetoothctlPlayer {
    fn name(&self) -> &str {
        "bluetoothctl-player"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Polling
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        let output = self.runner.run(PROGRAM, &["player.show"]).await?;
        Ok(parse_player(&output)
            .and_then(|player| player.into_candidate(SourceKind::Polling))
            .map(Observation::Candidate)
            .into_iter()
            .collect())
    }
}
