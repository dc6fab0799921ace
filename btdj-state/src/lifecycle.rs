//! Device connect/disconnect transitions
//!
//! The tracker turns connection evidence into `DeviceConnected` and
//! `DeviceDisconnected` events and resets per-device state on the way out.
//! It works on a locked [`DeviceTable`] and never publishes by itself; the
//! reconciler publishes the returned events once the lock is released.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::event::MonitorEvent;
use crate::model::{DeviceId, DeviceInfo};
use crate::store::DeviceTable;

/// Detects connect/disconnect transitions against the device table
#[derive(Debug, Default, Clone, Copy)]
pub struct LifecycleTracker;

impl LifecycleTracker {
    pub fn new() -> Self {
        Self
    }

    /// Record connection evidence for one device
    ///
    /// Returns `DeviceConnected` when the device was not tracked yet.
    pub fn connect(&self, table: &mut DeviceTable, info: DeviceInfo) -> Option<MonitorEvent> {
        let device = info.id.clone();
        let name = info.name.clone();
        if !table.insert(info) {
            return None;
        }

        info!(device = %device, name = ?name, "Device connected");
        Some(MonitorEvent::DeviceConnected { device, name })
    }

    /// Stop tracking a device and clear its state
    ///
    /// Returns `DeviceDisconnected` when the device was tracked.
    pub fn disconnect(&self, table: &mut DeviceTable, id: &DeviceId) -> Option<MonitorEvent> {
        table.remove(id)?;
        info!(device = %id, current = ?table.current(), "Device disconnected");
        Some(MonitorEvent::DeviceDisconnected { device: id.clone() })
    }

    /// Diff a full enumeration against the table
    ///
    /// New devices connect in enumeration order. Tracked devices missing from
    /// the list disconnect unless the event-driven source still has them
    /// attached.
    pub fn reconcile_enumeration(
        &self,
        table: &mut DeviceTable,
        devices: Vec<DeviceInfo>,
    ) -> Vec<MonitorEvent> {
        let present: HashSet<DeviceId> = devices.iter().map(|d| d.id.clone()).collect();
        let mut events = Vec::new();

        for info in devices {
            events.extend(self.connect(table, info));
        }

        for id in table.ids() {
            if present.contains(&id) {
                continue;
            }
            let corroborated = table.get(&id).is_some_and(|record| record.is_bus_attached());
            if corroborated {
                debug!(device = %id, "Missing from enumeration but still attached on the bus");
                continue;
            }
            events.extend(self.disconnect(table, &id));
        }

        events
    }
}
