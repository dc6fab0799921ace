//! Event-driven source over the platform audio-control bus
//!
//! The concrete bus binding lives behind [`BusAdapter`]. [`BusEventSource`]
//! handles registration bookkeeping, turns snapshots into polled
//! observations, and forwards pushed [`BusNotification`]s to the reconciler
//! with lower latency than any polling cycle.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use btdj_state::{DeviceId, Observation, SourceKind};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::parser::bus::{parse_properties, BusProperties, BusValue};
use crate::source::MetadataSource;

/// A push notification from the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusNotification {
    /// Properties of a device or its media player changed
    PropertiesChanged {
        /// Device id or object path the properties belong to
        path: String,
        /// Only the properties that changed
        properties: BusProperties,
    },
    /// The device object went away
    Removed { path: String },
    /// The bus itself appeared or disappeared
    Availability(bool),
}

/// Binding to the platform audio-control bus
#[async_trait]
pub trait BusAdapter: Send + Sync {
    /// Whether the bus service is reachable at all
    async fn is_available(&self) -> bool;

    /// Devices that currently expose a media player
    async fn devices(&self) -> Result<Vec<DeviceId>>;

    /// Subscribe to change notifications for one device
    async fn register(&self, device: &DeviceId) -> Result<()>;

    /// Current property dictionary of one device's media player
    async fn snapshot(&self, device: &DeviceId) -> Result<BusProperties>;
}

/// Event-driven metadata source
pub struct BusEventSource {
    adapter: Arc<dyn BusAdapter>,
    registered: Mutex<HashSet<DeviceId>>,
}

impl BusEventSource {
    pub fn new(adapter: Arc<dyn BusAdapter>) -> Self {
        Self {
            adapter,
            registered: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_registered(&self, device: &DeviceId) -> bool {
        self.registered.lock().contains(device)
    }

    /// Register for notifications unless already registered
    ///
    /// Returns `BusAttached` only on the call that established the
    /// registration. Failures leave the device unregistered so a later
    /// call retries.
    pub async fn ensure_registered(&self, device: &DeviceId) -> Option<Observation> {
        if self.is_registered(device) {
            return None;
        }

        match self.adapter.register(device).await {
            Ok(()) => {
                if !self.registered.lock().insert(device.clone()) {
                    return None;
                }
                info!(device = %device, "Registered for bus notifications");
                Some(Observation::BusAttached(device.clone()))
            }
            Err(e) => {
                warn!(device = %device, error = %e, "Bus registration failed");
                None
            }
        }
    }

    fn forget(&self, device: &DeviceId) {
        if self.registered.lock().remove(device) {
            debug!(device = %device, "Bus registration cleared");
        }
    }

    /// Translate properties of one device into observations
    fn observe(&self, device: DeviceId, properties: &BusProperties) -> Vec<Observation> {
        let update = parse_properties(properties);
        if update.connected == Some(false) {
            self.forget(&device);
            return vec![Observation::Disconnected(device)];
        }

        let mut player = update.player;
        player.device = Some(device);
        player
            .into_candidate(SourceKind::Bus)
            .map(Observation::Candidate)
            .into_iter()
            .collect()
    }

    /// Translate one pushed notification into observations
    pub async fn handle_notification(&self, notification: BusNotification) -> Vec<Observation> {
        match notification {
            BusNotification::Availability(available) => {
                if !available {
                    self.registered.lock().clear();
                }
                vec![Observation::BusAvailability(available)]
            }
            BusNotification::Removed { path } => match DeviceId::find_in(&path) {
                Some(device) => {
                    self.forget(&device);
                    vec![Observation::Disconnected(device)]
                }
                None => Vec::new(),
            },
            BusNotification::PropertiesChanged { path, properties } => {
                let Some(device) = DeviceId::find_in(&path) else {
                    debug!(%path, "Notification for an object without a device address");
                    return Vec::new();
                };
                let disconnecting =
                    properties.get("Connected").and_then(BusValue::as_bool) == Some(false);
                let mut observations: Vec<Observation> = Vec::new();
                if !disconnecting {
                    observations.extend(self.ensure_registered(&device).await);
                }
                observations.extend(self.observe(device, &properties));
                observations
            }
        }
    }

    /// Forward pushed notifications until cancelled or either channel closes
    pub async fn run(
        self: Arc<Self>,
        mut notifications: mpsc::Receiver<BusNotification>,
        observations: mpsc::Sender<Observation>,
        cancel: CancellationToken,
    ) {
        info!("Bus notification forwarder started");
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => break,
                notification = notifications.recv() => match notification {
                    Some(notification) => notification,
                    None => {
                        debug!("Bus notification channel closed");
                        break;
                    }
                },
            };

            for observation in self.handle_notification(notification).await {
                if observations.send(observation).await.is_err() {
                    debug!("Observation channel closed, stopping bus forwarder");
                    return;
                }
            }
        }
        info!("Bus notification forwarder stopped");
    }
}

#[async_trait]
impl MetadataSource for BusEventSource {
    fn name(&self) -> &str {
        "bus"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Bus
    }

    async fn query(&self) -> Result<Vec<Observation>> {
        if !self.adapter.is_available().await {
            self.registered.lock().clear();
            return Ok(vec![Observation::BusAvailability(false)]);
        }

        let mut observations = vec![Observation::BusAvailability(true)];
        for device in self.adapter.devices().await? {
            observations.extend(self.ensure_registered(&device).await);
            match self.adapter.snapshot(&device).await {
                Ok(properties) => observations.extend(self.observe(device, &properties)),
                Err(SourceError::Unavailable(reason)) => {
                    debug!(device = %device, %reason, "No bus snapshot");
                }
                Err(e) => warn!(device = %device, error = %e, "Bus snapshot failed"),
            }
        }
        Ok(observations)
    }
}
