//! Canonical change events and their fan-out
//!
//! The reconciler publishes one [`MonitorEvent`] per accepted change.
//! Consumers subscribe through [`EventBus::subscribe`] and read an
//! [`EventStream`]; closing the bus ends every stream.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{DeviceId, PlaybackState, TrackMetadata};

/// A deduplicated change emitted by the reconciler
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum MonitorEvent {
    TrackChanged {
        device: DeviceId,
        current: TrackMetadata,
        previous: Option<TrackMetadata>,
    },
    PlaybackStateChanged {
        device: DeviceId,
        current: PlaybackState,
        previous: PlaybackState,
        track: Option<TrackMetadata>,
    },
    DeviceConnected {
        device: DeviceId,
        name: Option<String>,
    },
    DeviceDisconnected {
        device: DeviceId,
    },
}

impl MonitorEvent {
    /// Device the event is about
    pub fn device(&self) -> &DeviceId {
        match self {
            MonitorEvent::TrackChanged { device, .. }
            | MonitorEvent::PlaybackStateChanged { device, .. }
            | MonitorEvent::DeviceConnected { device, .. }
            | MonitorEvent::DeviceDisconnected { device } => device,
        }
    }

    /// Short name of the event kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::TrackChanged { .. } => "track_changed",
            MonitorEvent::PlaybackStateChanged { .. } => "playback_state_changed",
            MonitorEvent::DeviceConnected { .. } => "device_connected",
            MonitorEvent::DeviceDisconnected { .. } => "device_disconnected",
        }
    }
}

/// Broadcast fan-out of canonical events
///
/// Publishing never blocks. Slow subscribers lag and skip the oldest
/// events instead of stalling the reconciler.
pub struct EventBus {
    capacity: usize,
    sender: RwLock<Option<broadcast::Sender<MonitorEvent>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            capacity: capacity.max(1),
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Publish an event to every live subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        match self.sender.read().as_ref() {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to events published from now on
    ///
    /// A subscription taken while the bus is closed ends immediately.
    pub fn subscribe(&self) -> EventStream {
        let receiver = match self.sender.read().as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        };
        EventStream { receiver }
    }

    /// Close the bus; all streams end after draining what they hold
    pub fn close(&self) {
        self.sender.write().take();
    }

    /// Reopen a closed bus so new subscriptions receive events again
    pub fn reopen(&self) {
        let mut sender = self.sender.write();
        if sender.is_none() {
            let (tx, _) = broadcast::channel(self.capacity);
            *sender = Some(tx);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Async stream of canonical events for one subscriber
pub struct EventStream {
    receiver: broadcast::Receiver<MonitorEvent>,
}

impl EventStream {
    /// Wait for the next event
    ///
    /// Returns `None` once the bus is closed and drained. Lagging is logged
    /// and skipped over.
    pub async fn next(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an event if one is ready, without waiting
    pub fn try_next(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every event that is ready right now
    pub fn drain(&mut self) -> Vec<MonitorEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
