use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use btdj_speech::OutputArbiter;
use btdj_state::{DeviceStore, EventStream, MonitorEvent};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CommentaryContext, CommentaryGenerator, FallbackPhrases};

#[derive(Debug, Default)]
pub struct CommentaryStats {
    generated: AtomicU64,
    fallback: AtomicU64,
    throttled: AtomicU64,
    ignored: AtomicU64,
}

impl CommentaryStats {
    /// Comments written by the generator
    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Comments taken from the local phrase list
    pub fn fallback(&self) -> u64 {
        self.fallback.load(Ordering::Relaxed)
    }

    /// Events skipped because a comment was made too recently
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// Events about devices other than the current one
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}

/// Turns canonical events into queued speech
pub struct CommentaryService {
    generator: Option<Arc<dyn CommentaryGenerator>>,
    phrases: FallbackPhrases,
    arbiter: OutputArbiter,
    store: DeviceStore,
    throttle: Duration,
    timeout: Duration,
    last_comment: Mutex<Option<Instant>>,
    stats: Arc<CommentaryStats>,
}

impl CommentaryService {
    pub fn new(arbiter: OutputArbiter, store: DeviceStore) -> Self {
        Self {
            generator: None,
            phrases: FallbackPhrases::default(),
            arbiter,
            store,
            throttle: Duration::from_secs(10),
            timeout: Duration::from_secs(15),
            last_comment: Mutex::new(None),
            stats: Arc::new(CommentaryStats::default()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn CommentaryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_phrases(mut self, phrases: FallbackPhrases) -> Self {
        self.phrases = phrases;
        self
    }

    /// Minimum time between two comments. Default: 10 seconds
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Generator deadline before falling back. Default: 15 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stats(&self) -> Arc<CommentaryStats> {
        Arc::clone(&self.stats)
    }

    /// React to one event, returning the text that was queued
    pub async fn handle(&self, event: &MonitorEvent, now: Instant) -> Option<String> {
        let device = event.device();
        let (is_current, name) = self.store.read(|table| {
            (
                table.current() == Some(device),
                table
                    .get(device)
                    .and_then(|record| record.name().map(str::to_string)),
            )
        });
        if !is_current {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(device = %device, kind = event.kind(), "Not the current device, no commentary");
            return None;
        }

        let context = CommentaryContext::from_event(event, name)?;

        {
            let mut last = self.last_comment.lock();
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) < self.throttle {
                    self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                    debug!(trigger = context.trigger.as_str(), "Commentary throttled");
                    return None;
                }
            }
            *last = Some(now);
        }

        let text = self.compose(&context).await;
        if text.trim().is_empty() {
            return None;
        }

        match self.arbiter.enqueue(text.clone()) {
            Ok(evicted) => {
                debug!(trigger = context.trigger.as_str(), evicted, "Commentary queued");
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "Could not queue commentary");
                None
            }
        }
    }

    async fn compose(&self, context: &CommentaryContext) -> String {
        if let Some(generator) = &self.generator {
            match tokio::time::timeout(self.timeout, generator.generate(context)).await {
                Ok(Ok(text)) => {
                    self.stats.generated.fetch_add(1, Ordering::Relaxed);
                    return text;
                }
                Ok(Err(e)) => {
                    warn!(generator = generator.name(), error = %e, "Commentary generation failed, using a stock phrase");
                }
                Err(_) => {
                    warn!(generator = generator.name(), timeout = ?self.timeout, "Commentary generation timed out, using a stock phrase");
                }
            }
        }
        self.stats.fallback.fetch_add(1, Ordering::Relaxed);
        self.phrases.phrase(context)
    }

    /// Consume events until cancelled or the stream ends
    pub async fn run(self, mut events: EventStream, cancel: CancellationToken) {
        info!("Commentary service started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.handle(&event, Instant::now()) => {}
            }
        }
        info!("Commentary service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentary::CommentaryError;
    use async_trait::async_trait;
    use btdj_speech::ArbiterConfig;
    use btdj_state::{
        DeviceId, DeviceInfo, EventBus, Observation, Reconciler, ReconcilerConfig, TrackMetadata,
    };

    struct FixedGenerator(Result<&'static str, ()>);

    #[async_trait]
    impl CommentaryGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _context: &CommentaryContext) -> Result<String, CommentaryError> {
            self.0.map(str::to_string).map_err(|_| CommentaryError::Empty)
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl CommentaryGenerator for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _context: &CommentaryContext) -> Result<String, CommentaryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn setup(devices: &[&str]) -> (DeviceStore, OutputArbiter) {
        let store = DeviceStore::new();
        let reconciler = Reconciler::new(
            store.clone(),
            Arc::new(EventBus::default()),
            ReconcilerConfig::default(),
        )
        .unwrap();
        let infos = devices.iter().map(|id| DeviceInfo::new(*id)).collect();
        reconciler.apply(Observation::Devices(infos), Instant::now());
        (store, OutputArbiter::new(ArbiterConfig::default()))
    }

    fn track_changed(device: &str, title: &str) -> MonitorEvent {
        MonitorEvent::TrackChanged {
            device: DeviceId::new(device),
            current: TrackMetadata::new("Test Artist", title),
            previous: None,
        }
    }

    const FIRST: &str = "AA:BB:CC:DD:EE:FF";
    const SECOND: &str = "11:22:33:44:55:66";

    #[tokio::test]
    async fn test_fallback_phrase_is_queued() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter.clone(), store);

        let text = service
            .handle(&track_changed(FIRST, "Test Song"), Instant::now())
            .await;

        assert_eq!(text.as_deref(), Some("Up next, Test Song by Test Artist."));
        assert_eq!(arbiter.pending(), 1);
        assert_eq!(service.stats().fallback(), 1);
    }

    #[tokio::test]
    async fn test_generator_text_wins() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter, store)
            .with_generator(Arc::new(FixedGenerator(Ok("What a tune."))));

        let text = service
            .handle(&track_changed(FIRST, "Test Song"), Instant::now())
            .await;
        assert_eq!(text.as_deref(), Some("What a tune."));
        assert_eq!(service.stats().generated(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter, store)
            .with_generator(Arc::new(FixedGenerator(Err(()))));

        let text = service
            .handle(&track_changed(FIRST, "Test Song"), Instant::now())
            .await;
        assert_eq!(text.as_deref(), Some("Up next, Test Song by Test Artist."));
        assert_eq!(service.stats().fallback(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_timeout_falls_back() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter, store)
            .with_generator(Arc::new(SlowGenerator))
            .with_timeout(Duration::from_secs(1));

        let text = service
            .handle(&track_changed(FIRST, "Test Song"), Instant::now())
            .await;
        assert_eq!(text.as_deref(), Some("Up next, Test Song by Test Artist."));
    }

    #[tokio::test]
    async fn test_non_current_device_is_ignored() {
        let (store, arbiter) = setup(&[FIRST, SECOND]);
        let service = CommentaryService::new(arbiter.clone(), store);

        let text = service
            .handle(&track_changed(SECOND, "Other Song"), Instant::now())
            .await;
        assert!(text.is_none());
        assert_eq!(service.stats().ignored(), 1);
        assert_eq!(arbiter.pending(), 0);
    }

    #[tokio::test]
    async fn test_throttle_between_comments() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter, store).with_throttle(Duration::from_secs(10));
        let start = Instant::now();

        assert!(service.handle(&track_changed(FIRST, "One"), start).await.is_some());
        assert!(service
            .handle(&track_changed(FIRST, "Two"), start + Duration::from_secs(4))
            .await
            .is_none());
        assert!(service
            .handle(&track_changed(FIRST, "Three"), start + Duration::from_secs(11))
            .await
            .is_some());
        assert_eq!(service.stats().throttled(), 1);
    }

    #[tokio::test]
    async fn test_uninteresting_event_does_not_consume_throttle() {
        let (store, arbiter) = setup(&[FIRST]);
        let service = CommentaryService::new(arbiter, store);
        let now = Instant::now();

        let seek = MonitorEvent::PlaybackStateChanged {
            device: DeviceId::new(FIRST),
            current: btdj_state::PlaybackState::SeekingForward,
            previous: btdj_state::PlaybackState::Playing,
            track: None,
        };
        assert!(service.handle(&seek, now).await.is_none());
        assert!(service.handle(&track_changed(FIRST, "Song"), now).await.is_some());
    }
}
