//! The output arbiter
//!
//! A bounded latest-wins queue drained by exactly one worker task. Callers
//! enqueue text without blocking; the worker renders one request at a time
//! under a render lock, so utterances never overlap.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::SpeechEngine;
use crate::error::{Result, SpeechError};
use crate::queue::{LatestWinsQueue, SpeechRequest};

/// Configuration for the output arbiter
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Pending requests kept while one is being spoken
    ///
    /// Default: 2
    pub queue_capacity: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self { queue_capacity: 2 }
    }
}

impl ArbiterConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Counters describing what happened to enqueued text
#[derive(Debug, Default)]
pub struct ArbiterStats {
    enqueued: AtomicU64,
    evicted: AtomicU64,
    spoken: AtomicU64,
    fallback: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl ArbiterStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Requests dropped because newer ones arrived
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Requests rendered by the primary engine
    pub fn spoken(&self) -> u64 {
        self.spoken.load(Ordering::Relaxed)
    }

    /// Requests rendered by the fallback engine
    pub fn fallback(&self) -> u64 {
        self.fallback.load(Ordering::Relaxed)
    }

    /// Requests no engine could render
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Requests still queued when the worker shut down
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Requests that reached a final outcome
    pub fn completed(&self) -> u64 {
        self.spoken() + self.fallback() + self.failed()
    }
}

/// Serializes speech output behind a latest-wins queue
///
/// Cheap to clone; all clones share the queue, lock and statistics.
#[derive(Clone)]
pub struct OutputArbiter {
    queue: Arc<LatestWinsQueue<SpeechRequest>>,
    render_lock: Arc<AsyncMutex<()>>,
    stats: Arc<ArbiterStats>,
    started: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl OutputArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            queue: Arc::new(LatestWinsQueue::new(config.queue_capacity)),
            render_lock: Arc::new(AsyncMutex::new(())),
            stats: Arc::new(ArbiterStats::default()),
            started: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue text for speaking without waiting
    ///
    /// Returns how many older pending requests were evicted to make room.
    pub fn enqueue(&self, text: impl Into<String>) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SpeechError::ShutDown);
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let evicted = self.queue.push(SpeechRequest::new(text));
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.stats
                .evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "Dropped stale speech requests");
        }
        Ok(evicted)
    }

    /// Render text right away, bypassing the queue
    ///
    /// Still waits for the render lock, so it never overlaps the worker.
    pub async fn speak_now(&self, engine: &dyn SpeechEngine, text: &str) -> Result<()> {
        let _guard = self.render_lock.lock().await;
        engine.speak(text).await
    }

    pub fn stats(&self) -> Arc<ArbiterStats> {
        Arc::clone(&self.stats)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Start the single worker
    ///
    /// The worker runs until `cancel` fires. A request already being
    /// spoken finishes; anything still queued is discarded.
    pub fn spawn(
        &self,
        primary: Arc<dyn SpeechEngine>,
        fallback: Option<Arc<dyn SpeechEngine>>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SpeechError::AlreadyRunning);
        }
        let worker = Worker {
            arbiter: self.clone(),
            primary,
            fallback,
        };
        Ok(tokio::spawn(worker.run(cancel)))
    }
}

impl std::fmt::Debug for OutputArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputArbiter")
            .field("pending", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct Worker {
    arbiter: OutputArbiter,
    primary: Arc<dyn SpeechEngine>,
    fallback: Option<Arc<dyn SpeechEngine>>,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        info!(engine = self.primary.name(), "Speech worker started");

        loop {
            while !cancel.is_cancelled() {
                let Some(request) = self.arbiter.queue.pop() else {
                    break;
                };
                self.render(request).await;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.arbiter.queue.notified() => {}
            }
        }

        self.arbiter.closed.store(true, Ordering::Release);
        let discarded = self.arbiter.queue.clear();
        self.arbiter
            .stats
            .discarded
            .fetch_add(discarded as u64, Ordering::Relaxed);
        info!(discarded, "Speech worker stopped");
    }

    async fn render(&self, request: SpeechRequest) {
        let _guard = self.arbiter.render_lock.lock().await;
        let stats = &self.arbiter.stats;
        debug!(waited = ?request.enqueued_at.elapsed(), "Speaking");

        let primary_error = match speak_guarded(self.primary.as_ref(), &request.text).await {
            Ok(()) => {
                stats.spoken.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            warn!(engine = self.primary.name(), error = %primary_error, "Speech failed");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        warn!(
            engine = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_error,
            "Speech failed, using fallback"
        );
        match speak_guarded(fallback.as_ref(), &request.text).await {
            Ok(()) => {
                stats.fallback.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(engine = fallback.name(), error = %e, "Fallback speech failed");
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Run one engine call, turning a panic into a render failure
async fn speak_guarded(engine: &dyn SpeechEngine, text: &str) -> Result<()> {
    match AssertUnwindSafe(engine.speak(text)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(SpeechError::RenderFailed {
            engine: engine.name().to_string(),
            reason: "engine panicked".to_string(),
        }),
    }
}
