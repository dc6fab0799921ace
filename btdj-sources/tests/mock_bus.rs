//! Scripted bus adapter for event-driven source tests.

#![allow(dead_code)]

use async_trait::async_trait;
use btdj_sources::{BusAdapter, BusProperties, Result, SourceError};
use btdj_state::DeviceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub struct MockBus {
    available: AtomicBool,
    devices: Mutex<Vec<DeviceId>>,
    snapshots: Mutex<HashMap<DeviceId, BusProperties>>,
    register_calls: AtomicU32,
    fail_registrations: AtomicU32,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            devices: Mutex::new(Vec::new()),
            snapshots: Mutex::new(HashMap::new()),
            register_calls: AtomicU32::new(0),
            fail_registrations: AtomicU32::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn add_device(&self, device: &str, properties: BusProperties) {
        let id = DeviceId::new(device);
        self.devices.lock().push(id.clone());
        self.snapshots.lock().insert(id, properties);
    }

    /// Make the next `count` registrations fail
    pub fn fail_next_registrations(&self, count: u32) {
        self.fail_registrations.store(count, Ordering::SeqCst);
    }

    pub fn register_calls(&self) -> u32 {
        self.register_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusAdapter for MockBus {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn devices(&self) -> Result<Vec<DeviceId>> {
        Ok(self.devices.lock().clone())
    }

    async fn register(&self, _device: &DeviceId) -> Result<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_registrations.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_registrations.store(remaining - 1, Ordering::SeqCst);
            return Err(SourceError::Bus("registration refused".to_string()));
        }
        Ok(())
    }

    async fn snapshot(&self, device: &DeviceId) -> Result<BusProperties> {
        self.snapshots
            .lock()
            .get(device)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable(format!("no player for {}", device)))
    }
}
