//! The reconciliation engine
//!
//! Every observation from every source funnels through [`Reconciler::apply`].
//! Each call performs one read-modify-write cycle on the [`DeviceStore`]
//! under its lock, collects the canonical events that cycle produced, and
//! publishes them on the [`EventBus`] after the lock is released.
//!
//! Rules applied per candidate:
//! 1. Unknown devices connect first, so `DeviceConnected` leads.
//! 2. The track is reconciled before the state; the state event carries the
//!    track that is current after this candidate.
//! 3. A track is accepted only when valid and unequal to the stored one.
//! 4. A state is accepted only when known and unequal to the stored one.
//! 5. A polling value never replaces a value the bus supplied while the
//!    device is still attached on the bus.
//!
//! Activity never connects a device; presence comes from enumeration and
//! candidates. Activity-only devices go through a pending stop that expires
//! on [`Reconciler::tick`] after the grace window.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::event::{EventBus, MonitorEvent};
use crate::lifecycle::LifecycleTracker;
use crate::model::{Candidate, DeviceId, DeviceInfo, Observation, PlaybackState, SourceKind};
use crate::store::{DeviceRecord, DeviceStore, DeviceTable};

/// Applies observations to the store and emits canonical events
pub struct Reconciler {
    store: DeviceStore,
    events: Arc<EventBus>,
    lifecycle: LifecycleTracker,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Fails when `config` does not validate
    pub fn new(
        store: DeviceStore,
        events: Arc<EventBus>,
        config: ReconcilerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            events,
            lifecycle: LifecycleTracker::new(),
            config,
        })
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Apply one observation at instant `now`
    ///
    /// Returns the events that were published, in emission order.
    pub fn apply(&self, observation: Observation, now: Instant) -> Vec<MonitorEvent> {
        trace!(?observation, "Applying observation");

        let events = self.store.update(|table| match observation {
            Observation::Candidate(candidate) => self.apply_candidate(table, candidate, now),
            Observation::Activity { device, active } => {
                self.apply_activity(table, device, active, now)
            }
            Observation::Devices(devices) => self.lifecycle.reconcile_enumeration(table, devices),
            Observation::Disconnected(id) => self.lifecycle.disconnect(table, &id).into_iter().collect(),
            Observation::BusAttached(id) => self.apply_bus_attached(table, id),
            Observation::BusAvailability(available) => {
                apply_bus_availability(table, available);
                Vec::new()
            }
        });

        self.publish(&events);
        events
    }

    /// Expire pending stops whose grace window has passed
    pub fn tick(&self, now: Instant) -> Vec<MonitorEvent> {
        let grace = self.config.grace_window;

        let events = self.store.update(|table| {
            let mut events = Vec::new();
            for record in table.records_mut() {
                let Some(gap_since) = record.gap_since else {
                    continue;
                };
                if record.state_origin.is_some() {
                    record.gap_since = None;
                    continue;
                }

                let anchor = match record.last_track_change {
                    Some(changed) if changed > gap_since => changed,
                    _ => gap_since,
                };
                if now < anchor + grace {
                    continue;
                }

                record.gap_since = None;
                if let Some(event) = set_state(record, PlaybackState::Stopped) {
                    info!(device = %record.id, "Audio gap outlasted grace window, playback stopped");
                    events.push(event);
                }
            }
            events
        });

        self.publish(&events);
        events
    }

    /// Run the reconciliation loop until cancelled or every sender is gone
    ///
    /// Observations are applied in arrival order; the tick interval expires
    /// pending stops in between.
    pub async fn run(self, mut observations: mpsc::Receiver<Observation>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Reconciler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                observation = observations.recv() => match observation {
                    Some(observation) => {
                        self.apply(observation, Instant::now());
                    }
                    None => {
                        debug!("All observation senders dropped");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }
        info!("Reconciler stopped");
    }

    fn publish(&self, events: &[MonitorEvent]) {
        for event in events {
            let receivers = self.events.publish(event.clone());
            debug!(kind = event.kind(), device = %event.device(), receivers, "Published event");
        }
    }

    fn apply_candidate(
        &self,
        table: &mut DeviceTable,
        candidate: Candidate,
        now: Instant,
    ) -> Vec<MonitorEvent> {
        let Candidate {
            device,
            source,
            track,
            state,
        } = candidate;

        let Some(id) = resolve_device(table, device) else {
            trace!("Dropping candidate without a device to attribute it to");
            return Vec::new();
        };

        let mut events: Vec<MonitorEvent> = self
            .lifecycle
            .connect(table, DeviceInfo::new(id.clone()))
            .into_iter()
            .collect();

        let Some(record) = table.get_mut(&id) else {
            return events;
        };
        if source == SourceKind::Bus {
            record.bus_attached = true;
        }

        if let Some(track) = track.filter(|t| t.is_valid()) {
            if may_replace(record.track_origin, source, record.bus_attached) {
                record.track_origin = Some(source);
                if record.track.as_ref() != Some(&track) {
                    let previous = record.track.replace(track.clone());
                    record.last_track_change = Some(now);
                    info!(device = %id, artist = %track.artist, title = %track.title, "Track changed");
                    events.push(MonitorEvent::TrackChanged {
                        device: id.clone(),
                        current: track,
                        previous,
                    });
                }
            } else {
                trace!(device = %id, ?source, "Track candidate outranked by bus value");
            }
        }

        if let Some(state) = state.filter(|s| s.is_known()) {
            if may_replace(record.state_origin, source, record.bus_attached) {
                record.state_origin = Some(source);
                record.gap_since = None;
                events.extend(set_state(record, state));
            } else {
                trace!(device = %id, ?source, "State candidate outranked by bus value");
            }
        }

        events
    }

    fn apply_activity(
        &self,
        table: &mut DeviceTable,
        device: Option<DeviceId>,
        active: bool,
        now: Instant,
    ) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let Some(id) = resolve_device(table, device) else {
            return events;
        };
        let Some(record) = table.get_mut(&id) else {
            trace!(device = %id, "Ignoring activity for untracked device");
            return events;
        };
        if record.state_origin.is_some() {
            trace!(device = %id, "Ignoring activity, structured state available");
            return events;
        }

        if active {
            if record.gap_since.take().is_some() {
                debug!(device = %id, "Audio resumed within grace window");
            }
            events.extend(set_state(record, PlaybackState::Playing));
        } else if record.state == PlaybackState::Playing && record.gap_since.is_none() {
            debug!(device = %id, "Audio gap started, stop pending");
            record.gap_since = Some(now);
        }

        events
    }

    fn apply_bus_attached(&self, table: &mut DeviceTable, id: DeviceId) -> Vec<MonitorEvent> {
        table.set_bus_available(true);
        let events: Vec<MonitorEvent> = self
            .lifecycle
            .connect(table, DeviceInfo::new(id.clone()))
            .into_iter()
            .collect();
        if let Some(record) = table.get_mut(&id) {
            record.bus_attached = true;
        }
        events
    }
}

fn apply_bus_availability(table: &mut DeviceTable, available: bool) {
    if table.bus_available() != available {
        info!(available, "Event-driven source availability changed");
    }
    table.set_bus_available(available);
    if !available {
        for record in table.records_mut() {
            record.bus_attached = false;
        }
    }
}

/// Explicit device, or the current one when the source could not tell
fn resolve_device(table: &DeviceTable, device: Option<DeviceId>) -> Option<DeviceId> {
    device.or_else(|| table.current().cloned())
}

/// Whether a value from `incoming` may replace one supplied by `origin`
fn may_replace(origin: Option<SourceKind>, incoming: SourceKind, bus_attached: bool) -> bool {
    match origin {
        None => true,
        Some(SourceKind::Bus) if !bus_attached => true,
        Some(origin) => incoming <= origin,
    }
}

fn set_state(record: &mut DeviceRecord, state: PlaybackState) -> Option<MonitorEvent> {
    if record.state == state {
        return None;
    }
    let previous = std::mem::replace(&mut record.state, state);
    info!(device = %record.id, %previous, current = %state, "Playback state changed");
    Some(MonitorEvent::PlaybackStateChanged {
        device: record.id.clone(),
        current: state,
        previous,
        track: record.track.clone(),
    })
}
