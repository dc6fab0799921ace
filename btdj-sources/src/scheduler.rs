//! Polling scheduler
//!
//! Two loops drive the polling sources:
//! - the presence loop asks every presence source for the connected-device
//!   list on a short cadence
//! - the metadata loop queries every metadata source concurrently, merges
//!   their candidates per device, and forwards the result
//!
//! Sources such as `playerctl` cannot tell which device they describe. Their
//! candidates are attributed before the merge, so they compete with named
//! candidates for the same device instead of bypassing the priority order.
//!
//! Both loops guard each cycle: a panic or error is logged, followed by the
//! error backoff, and the loop carries on. Cancellation is checked at every
//! sleep, so loops stop within one interval.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btdj_state::{Candidate, DeviceId, DeviceInfo, DeviceStore, Observation};
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SourceError};
use crate::source::{MetadataSource, SourceRole};

/// Cadences and limits of the polling loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval of the connected-device check
    /// Default: 2 seconds
    pub presence_interval: Duration,

    /// Interval of the track/state cycle
    /// Default: 3 seconds
    pub metadata_interval: Duration,

    /// Upper bound for one source query
    /// Default: 5 seconds
    pub source_timeout: Duration,

    /// Delay after a failed or panicked cycle
    /// Default: 5 seconds
    pub error_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            presence_interval: Duration::from_secs(2),
            metadata_interval: Duration::from_secs(3),
            source_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Counters shared by both loops
#[derive(Debug, Default)]
pub struct SchedulerStats {
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
    observations: AtomicU64,
    timeouts: AtomicU64,
}

impl SchedulerStats {
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::Relaxed)
    }

    pub fn observations(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

/// Runs the presence and metadata loops over a fixed set of sources
///
/// Sources are consulted in the order they were added, which is their
/// priority within a cycle.
pub struct PollingScheduler {
    config: SchedulerConfig,
    presence: Vec<Arc<dyn MetadataSource>>,
    metadata: Vec<Arc<dyn MetadataSource>>,
    store: Option<DeviceStore>,
    stats: Arc<SchedulerStats>,
}

impl PollingScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            presence: Vec::new(),
            metadata: Vec::new(),
            store: None,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// Attribute unnamed candidates to the store's current device
    ///
    /// Without a store they go to the only device named in the same cycle,
    /// if there is exactly one.
    pub fn with_device_store(mut self, store: DeviceStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a source to the loop its role calls for
    pub fn add_source(&mut self, source: Arc<dyn MetadataSource>) {
        debug!(source = source.name(), role = ?source.role(), "Adding source");
        match source.role() {
            SourceRole::Presence => self.presence.push(source),
            SourceRole::Metadata => self.metadata.push(source),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.add_source(source);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    pub fn source_count(&self) -> usize {
        self.presence.len() + self.metadata.len()
    }

    /// Query one source under the per-call timeout
    async fn poll_source(&self, source: &Arc<dyn MetadataSource>) -> Vec<Observation> {
        match tokio::time::timeout(self.config.source_timeout, source.poll()).await {
            Ok(observations) => observations,
            Err(_) => {
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = source.name(),
                    timeout = ?self.config.source_timeout,
                    "Source query timed out"
                );
                Vec::new()
            }
        }
    }

    async fn poll_all(&self, sources: &[Arc<dyn MetadataSource>]) -> Vec<Vec<Observation>> {
        join_all(sources.iter().map(|source| self.poll_source(source))).await
    }

    /// One presence cycle: the union of every reported device list
    ///
    /// Yields nothing when no presence source answered, so a failing tool
    /// never reads as "all devices gone".
    pub async fn presence_cycle(&self) -> Vec<Observation> {
        let results = self.poll_all(&self.presence).await;
        merge_presence(results)
    }

    /// One metadata cycle: concurrent queries merged per device
    pub async fn metadata_cycle(&self) -> Vec<Observation> {
        let results = self.poll_all(&self.metadata).await;
        let current = self.store.as_ref().and_then(DeviceStore::current_device);
        merge_metadata(results, current)
    }

    /// Spawn both loops, forwarding observations into `sender`
    pub fn spawn(
        self,
        sender: mpsc::Sender<Observation>,
        cancel: CancellationToken,
    ) -> SchedulerHandle {
        let scheduler = Arc::new(self);
        let mut tasks = Vec::new();

        if !scheduler.presence.is_empty() {
            let (scheduler, sender, cancel) =
                (Arc::clone(&scheduler), sender.clone(), cancel.clone());
            tasks.push(tokio::spawn(async move {
                let interval = scheduler.config.presence_interval;
                scheduler
                    .run_loop("presence", interval, sender, cancel, |s| {
                        async move { s.presence_cycle().await }.boxed()
                    })
                    .await;
            }));
        }

        if !scheduler.metadata.is_empty() {
            let (scheduler, sender, cancel) =
                (Arc::clone(&scheduler), sender.clone(), cancel.clone());
            tasks.push(tokio::spawn(async move {
                let interval = scheduler.config.metadata_interval;
                scheduler
                    .run_loop("metadata", interval, sender, cancel, |s| {
                        async move { s.metadata_cycle().await }.boxed()
                    })
                    .await;
            }));
        }

        SchedulerHandle { tasks }
    }

    async fn run_loop<F>(
        self: Arc<Self>,
        name: &'static str,
        interval: Duration,
        sender: mpsc::Sender<Observation>,
        cancel: CancellationToken,
        cycle: F,
    ) where
        F: Fn(Arc<Self>) -> futures::future::BoxFuture<'static, Vec<Observation>>,
    {
        info!(loop_name = name, ?interval, "Polling loop started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = AssertUnwindSafe(self.guarded_cycle(&sender, cycle(Arc::clone(&self))))
                .catch_unwind()
                .await;

            let delay = match outcome {
                Ok(Ok(count)) => {
                    self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                    debug!(loop_name = name, observations = count, "Cycle complete");
                    interval
                }
                Ok(Err(SourceError::ChannelClosed)) => {
                    debug!(loop_name = name, "Observation channel closed");
                    break;
                }
                Ok(Err(e)) => {
                    self.stats.failed_cycles.fetch_add(1, Ordering::Relaxed);
                    warn!(loop_name = name, error = %e, "Cycle failed, backing off");
                    self.config.error_backoff
                }
                Err(_) => {
                    self.stats.failed_cycles.fetch_add(1, Ordering::Relaxed);
                    error!(loop_name = name, "Cycle panicked, backing off");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(loop_name = name, "Polling loop stopped");
    }

    async fn guarded_cycle(
        &self,
        sender: &mpsc::Sender<Observation>,
        cycle: futures::future::BoxFuture<'static, Vec<Observation>>,
    ) -> Result<usize> {
        let observations = cycle.await;
        let count = observations.len();
        for observation in observations {
            sender
                .send(observation)
                .await
                .map_err(|_| SourceError::ChannelClosed)?;
        }
        self.stats
            .observations
            .fetch_add(count as u64, Ordering::Relaxed);
        Ok(count)
    }
}

/// Join handles of the spawned loops
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Wait for every loop to finish
    pub async fn join(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Polling loop task failed");
            }
        }
    }

    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

/// Union of the device lists in one presence cycle
fn merge_presence(results: Vec<Vec<Observation>>) -> Vec<Observation> {
    let mut devices: Vec<DeviceInfo> = Vec::new();
    let mut answered = false;
    let mut passthrough = Vec::new();

    for observation in results.into_iter().flatten() {
        match observation {
            Observation::Devices(list) => {
                answered = true;
                for info in list {
                    match devices.iter_mut().find(|known| known.id == info.id) {
                        Some(known) if known.name.is_none() => known.name = info.name,
                        Some(_) => {}
                        None => devices.push(info),
                    }
                }
            }
            other => passthrough.push(other),
        }
    }

    if answered {
        passthrough.insert(0, Observation::Devices(devices));
    }
    passthrough
}

/// Merge one metadata cycle per device
///
/// Unnamed candidates are first attributed to `current`, or failing that to
/// the only device named in the cycle. Then, for each device, the first
/// source in priority order with a valid track supplies the track and the
/// first with a known state supplies the state, independently of each other.
/// Everything other than candidates passes through in order, ahead of the
/// merged candidates.
fn merge_metadata(
    results: Vec<Vec<Observation>>,
    current: Option<DeviceId>,
) -> Vec<Observation> {
    let observations: Vec<Observation> = results.into_iter().flatten().collect();
    let fallback = current.or_else(|| sole_named_device(&observations));

    let mut passthrough = Vec::new();
    let mut order: Vec<Option<DeviceId>> = Vec::new();
    let mut tracks: HashMap<Option<DeviceId>, Candidate> = HashMap::new();
    let mut states: HashMap<Option<DeviceId>, Candidate> = HashMap::new();

    for observation in observations {
        let Observation::Candidate(candidate) = observation else {
            passthrough.push(observation);
            continue;
        };

        let key = candidate.device.clone().or_else(|| fallback.clone());
        if !order.contains(&key) {
            order.push(key.clone());
        }

        if let Some(track) = candidate.track.clone().filter(|t| t.is_valid()) {
            tracks
                .entry(key.clone())
                .or_insert_with(|| Candidate::new(key.clone(), candidate.source).with_track(track));
        }
        if let Some(state) = candidate.state.filter(|s| s.is_known()) {
            states
                .entry(key.clone())
                .or_insert_with(|| Candidate::new(key, candidate.source).with_state(state));
        }
    }

    for key in order {
        let track = tracks.remove(&key);
        let state = states.remove(&key);
        match (track, state) {
            (Some(mut track), Some(state)) if track.source == state.source => {
                track.state = state.state;
                passthrough.push(Observation::Candidate(track));
            }
            (track, state) => {
                passthrough.extend(track.map(Observation::Candidate));
                passthrough.extend(state.map(Observation::Candidate));
            }
        }
    }

    passthrough
}

/// The device every named candidate in the cycle agrees on, if any
fn sole_named_device(observations: &[Observation]) -> Option<DeviceId> {
    let mut named = observations.iter().filter_map(|observation| match observation {
        Observation::Candidate(candidate) => candidate.device.as_ref(),
        _ => None,
    });
    let first = named.next()?;
    named.all(|id| id == first).then(|| first.clone())
}
