//! Per-device state storage
//!
//! This module provides the storage primitives for reconciled state:
//! - `DeviceRecord`: everything known about one connected device
//! - `DeviceTable`: the collection of records plus current-device selection
//! - `DeviceStore`: the shared handle guarding a `DeviceTable` with one lock
//!
//! Only the reconciler mutates the table. The lock is held for one
//! read-modify-write at a time and never across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::model::{DeviceId, DeviceInfo, PlaybackState, SourceKind, TrackMetadata};

// ============================================================================
// DeviceRecord - state of one device
// ============================================================================

/// Last accepted state for one device
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub(crate) id: DeviceId,
    pub(crate) name: Option<String>,
    pub(crate) track: Option<TrackMetadata>,
    pub(crate) track_origin: Option<SourceKind>,
    pub(crate) state: PlaybackState,
    pub(crate) state_origin: Option<SourceKind>,
    pub(crate) last_track_change: Option<Instant>,
    /// Start of the current audio gap, while a stop is pending
    pub(crate) gap_since: Option<Instant>,
    pub(crate) bus_attached: bool,
    /// Connection order, used for first-seen-wins promotion
    pub(crate) seen_order: u64,
}

impl DeviceRecord {
    fn new(info: DeviceInfo, seen_order: u64) -> Self {
        Self {
            id: info.id,
            name: info.name,
            track: None,
            track_origin: None,
            state: PlaybackState::Unknown,
            state_origin: None,
            last_track_change: None,
            gap_since: None,
            bus_attached: false,
            seen_order,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn track(&self) -> Option<&TrackMetadata> {
        self.track.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn last_track_change(&self) -> Option<Instant> {
        self.last_track_change
    }

    pub fn is_bus_attached(&self) -> bool {
        self.bus_attached
    }

    /// Plain snapshot for callers outside the lock
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            track: self.track.clone(),
            state: self.state,
            bus_attached: self.bus_attached,
        }
    }
}

/// Cloned view of a device record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub id: DeviceId,
    pub name: Option<String>,
    pub track: Option<TrackMetadata>,
    pub state: PlaybackState,
    pub bus_attached: bool,
}

// ============================================================================
// DeviceTable - all tracked devices
// ============================================================================

/// Collection of device records with current-device selection
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: HashMap<DeviceId, DeviceRecord>,
    current: Option<DeviceId>,
    bus_available: bool,
    next_order: u64,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a device; returns `false` if it was already tracked
    ///
    /// A known device only picks up a name it did not have before.
    pub fn insert(&mut self, info: DeviceInfo) -> bool {
        if let Some(record) = self.devices.get_mut(&info.id) {
            if record.name.is_none() {
                record.name = info.name;
            }
            return false;
        }

        let id = info.id.clone();
        let record = DeviceRecord::new(info, self.next_order);
        self.next_order += 1;
        self.devices.insert(id.clone(), record);

        if self.current.is_none() {
            self.current = Some(id);
        }
        true
    }

    /// Stop tracking a device, clearing all of its state
    pub fn remove(&mut self, id: &DeviceId) -> Option<DeviceRecord> {
        let removed = self.devices.remove(id)?;
        if self.current.as_ref() == Some(id) {
            self.current = self
                .devices
                .values()
                .min_by_key(|record| record.seen_order)
                .map(|record| record.id.clone());
        }
        Some(removed)
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &DeviceId) -> Option<&mut DeviceRecord> {
        self.devices.get_mut(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    /// Device that drives commentary when several are connected
    pub fn current(&self) -> Option<&DeviceId> {
        self.current.as_ref()
    }

    /// Tracked device IDs in connection order
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut records: Vec<&DeviceRecord> = self.devices.values().collect();
        records.sort_by_key(|record| record.seen_order);
        records.into_iter().map(|record| record.id.clone()).collect()
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut DeviceRecord> {
        self.devices.values_mut()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn bus_available(&self) -> bool {
        self.bus_available
    }

    pub(crate) fn set_bus_available(&mut self, available: bool) {
        self.bus_available = available;
    }
}

// ============================================================================
// DeviceStore - shared handle
// ============================================================================

/// Shared, lock-guarded per-device store
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct DeviceStore {
    table: Arc<Mutex<DeviceTable>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one read-modify-write cycle under the lock
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut DeviceTable) -> R) -> R {
        let mut table = self.table.lock();
        f(&mut table)
    }

    /// Run a read-only closure under the lock
    pub fn read<R>(&self, f: impl FnOnce(&DeviceTable) -> R) -> R {
        let table = self.table.lock();
        f(&table)
    }

    /// Current track of a device, if tracked and known
    pub fn current_track(&self, id: &DeviceId) -> Option<TrackMetadata> {
        self.read(|table| table.get(id).and_then(|record| record.track.clone()))
    }

    /// Current playback state; `Unknown` for untracked devices
    pub fn current_state(&self, id: &DeviceId) -> PlaybackState {
        self.read(|table| table.get(id).map_or(PlaybackState::Unknown, |r| r.state))
    }

    /// Connected devices in connection order
    pub fn connected_devices(&self) -> Vec<DeviceInfo> {
        self.read(|table| {
            table
                .ids()
                .into_iter()
                .filter_map(|id| table.get(&id))
                .map(|record| DeviceInfo {
                    id: record.id.clone(),
                    name: record.name.clone(),
                })
                .collect()
        })
    }

    pub fn current_device(&self) -> Option<DeviceId> {
        self.read(|table| table.current().cloned())
    }

    pub fn snapshot(&self, id: &DeviceId) -> Option<DeviceSnapshot> {
        self.read(|table| table.get(id).map(DeviceRecord::snapshot))
    }

    pub fn device_count(&self) -> usize {
        self.read(DeviceTable::len)
    }
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore")
            .field("device_count", &self.device_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> DeviceInfo {
        DeviceInfo::new(id)
    }

    #[test]
    fn test_first_seen_becomes_current() {
        let mut table = DeviceTable::new();
        assert!(table.insert(info("11:11:11:11:11:11")));
        assert!(table.insert(info("22:22:22:22:22:22")));
        assert!(!table.insert(info("11:11:11:11:11:11")));

        assert_eq!(table.current(), Some(&DeviceId::new("11:11:11:11:11:11")));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_removing_current_promotes_oldest_remaining() {
        let mut table = DeviceTable::new();
        table.insert(info("11:11:11:11:11:11"));
        table.insert(info("22:22:22:22:22:22"));
        table.insert(info("33:33:33:33:33:33"));

        table.remove(&DeviceId::new("11:11:11:11:11:11"));
        assert_eq!(table.current(), Some(&DeviceId::new("22:22:22:22:22:22")));

        table.remove(&DeviceId::new("22:22:22:22:22:22"));
        table.remove(&DeviceId::new("33:33:33:33:33:33"));
        assert_eq!(table.current(), None);
    }

    #[test]
    fn test_insert_fills_missing_name() {
        let mut table = DeviceTable::new();
        table.insert(info("11:11:11:11:11:11"));
        table.insert(DeviceInfo::named("11:11:11:11:11:11", "Headphones"));

        let record = table.get(&DeviceId::new("11:11:11:11:11:11")).unwrap();
        assert_eq!(record.name(), Some("Headphones"));
    }

    #[test]
    fn test_store_clone_shares_state() {
        let store1 = DeviceStore::new();
        let store2 = store1.clone();

        store1.update(|table| table.insert(info("11:11:11:11:11:11")));

        assert_eq!(store2.device_count(), 1);
        assert_eq!(
            store2.current_state(&DeviceId::new("11:11:11:11:11:11")),
            PlaybackState::Unknown
        );
        assert_eq!(store2.current_track(&DeviceId::new("11:11:11:11:11:11")), None);
    }

    #[test]
    fn test_connected_devices_in_connection_order() {
        let store = DeviceStore::new();
        store.update(|table| {
            table.insert(info("33:33:33:33:33:33"));
            table.insert(info("11:11:11:11:11:11"));
        });

        let ids: Vec<_> = store.connected_devices().into_iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                DeviceId::new("33:33:33:33:33:33"),
                DeviceId::new("11:11:11:11:11:11")
            ]
        );
    }
}
