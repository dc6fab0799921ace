//! Monitor - main entry point
//!
//! Wires sources, the reconciler, the output arbiter and the commentary
//! service together behind a small API:
//!
//! - [`Monitor::initialize`] seeds the device table with one presence check
//! - [`Monitor::start_monitoring`] / [`Monitor::stop_monitoring`]
//! - queries: [`Monitor::current_track`], [`Monitor::current_state`],
//!   [`Monitor::connected_devices`], [`Monitor::current_device`]
//! - [`Monitor::subscribe`] for the canonical event stream

use std::sync::Arc;
use std::time::Instant;

use btdj_sources::sources::{
    BluetoothctlDevices, BluetoothctlPlayer, KeyValueCommandSource, PactlActivity, Playerctl,
};
use btdj_sources::{
    BusAdapter, BusEventSource, BusNotification, CommandRunner, MetadataSource, PollingScheduler,
    ProcessRunner, SchedulerHandle, SourceRole,
};
use btdj_speech::{ArbiterStats, CommandSpeechEngine, LogSpeechEngine, OutputArbiter, SpeechEngine};
use btdj_state::{
    DeviceId, DeviceInfo, DeviceStore, EventBus, EventStream, PlaybackState, Reconciler,
    TrackMetadata,
};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::commentary::{CommentaryGenerator, CommentaryService, HttpCommentaryGenerator};
use crate::config::{MonitorConfig, SourcesConfig, SpeechConfig};
use crate::error::{ConfigError, MonitorError, Result};

/// Builder for [`Monitor`]
///
/// Anything not supplied is built from the [`MonitorConfig`]: command-line
/// sources over a [`ProcessRunner`], a command speech engine and, when an
/// endpoint is configured, an HTTP commentary generator.
pub struct MonitorBuilder {
    config: MonitorConfig,
    sources: Vec<Arc<dyn MetadataSource>>,
    default_sources: bool,
    runner: Option<Arc<dyn CommandRunner>>,
    bus: Option<Arc<dyn BusAdapter>>,
    bus_notifications: Option<mpsc::Receiver<BusNotification>>,
    speech: Option<Arc<dyn SpeechEngine>>,
    fallback_speech: Option<Arc<dyn SpeechEngine>>,
    generator: Option<Arc<dyn CommentaryGenerator>>,
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self {
            config: MonitorConfig::default(),
            sources: Vec::new(),
            default_sources: true,
            runner: None,
            bus: None,
            bus_notifications: None,
            speech: None,
            fallback_speech: None,
            generator: None,
        }
    }
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a source ahead of the configured command-line sources
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Use only sources added with [`MonitorBuilder::with_source`]
    pub fn without_default_sources(mut self) -> Self {
        self.default_sources = false;
        self
    }

    /// Runner for the command-line sources
    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Event-driven bus source, optionally with its push notifications
    pub fn with_bus(
        mut self,
        adapter: Arc<dyn BusAdapter>,
        notifications: Option<mpsc::Receiver<BusNotification>>,
    ) -> Self {
        self.bus = Some(adapter);
        self.bus_notifications = notifications;
        self
    }

    pub fn with_speech_engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.speech = Some(engine);
        self
    }

    pub fn with_fallback_speech_engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.fallback_speech = Some(engine);
        self
    }

    pub fn with_commentary_generator(mut self, generator: Arc<dyn CommentaryGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<Monitor> {
        self.config.validate()?;
        let config = self.config;

        let mut sources = self.sources;
        if self.default_sources {
            let runner = self
                .runner
                .unwrap_or_else(|| Arc::new(ProcessRunner::new(config.source_timeout)));
            sources.extend(command_sources(&config.sources, runner));
        }

        let bus = self.bus.map(|adapter| Arc::new(BusEventSource::new(adapter)));
        if let Some(bus) = &bus {
            sources.insert(0, Arc::clone(bus) as Arc<dyn MetadataSource>);
        }

        let (speech, fallback_speech) = match self.speech {
            Some(engine) => (engine, self.fallback_speech),
            None => {
                let (primary, fallback) = speech_engines(&config.speech);
                (primary, self.fallback_speech.or(fallback))
            }
        };

        let generator = match (self.generator, &config.commentary.endpoint) {
            (Some(generator), _) => Some(generator),
            (None, Some(endpoint)) => Some(Arc::new(HttpCommentaryGenerator::new(
                endpoint.as_str(),
                config.commentary.model.as_str(),
                config.commentary_timeout,
            )?) as Arc<dyn CommentaryGenerator>),
            (None, None) => None,
        };

        debug!(sources = sources.len(), bus = bus.is_some(), "Monitor built");

        Ok(Monitor {
            store: DeviceStore::new(),
            events: Arc::new(EventBus::new(config.event_buffer)),
            components: Components {
                sources,
                bus,
                speech,
                fallback_speech,
                generator,
            },
            config,
            inner: Mutex::new(Inner {
                initialized: false,
                bus_notifications: self.bus_notifications,
                running: None,
            }),
        })
    }
}

fn command_sources(
    config: &SourcesConfig,
    runner: Arc<dyn CommandRunner>,
) -> Vec<Arc<dyn MetadataSource>> {
    let mut sources: Vec<Arc<dyn MetadataSource>> = Vec::new();
    if config.bluetoothctl {
        sources.push(Arc::new(BluetoothctlDevices::new(Arc::clone(&runner))));
        sources.push(Arc::new(BluetoothctlPlayer::new(Arc::clone(&runner))));
    }
    if config.playerctl {
        let mut playerctl = Playerctl::new(Arc::clone(&runner));
        if let Some(player) = &config.playerctl_player {
            playerctl = playerctl.with_player(player.as_str());
        }
        sources.push(Arc::new(playerctl));
    }
    for command in &config.commands {
        let mut source = KeyValueCommandSource::new(
            command.name.as_str(),
            Arc::clone(&runner),
            command.program.as_str(),
            command.args.clone(),
        );
        if let Some(device) = &command.device {
            source = source.for_device(DeviceId::new(device));
        }
        sources.push(Arc::new(source));
    }
    if config.pactl {
        sources.push(Arc::new(PactlActivity::new(runner)));
    }
    sources
}

fn command_engine(command: &[String], config: &SpeechConfig) -> Option<CommandSpeechEngine> {
    let (program, args) = command.split_first()?;
    Some(
        CommandSpeechEngine::new(program.as_str())
            .with_args(args.iter().cloned())
            .with_timeout(config.timeout),
    )
}

fn speech_engines(
    config: &SpeechConfig,
) -> (Arc<dyn SpeechEngine>, Option<Arc<dyn SpeechEngine>>) {
    if !config.enabled {
        return (Arc::new(LogSpeechEngine), None);
    }
    let Some(primary) = command_engine(&config.command, config) else {
        return (Arc::new(LogSpeechEngine), None);
    };
    let fallback: Arc<dyn SpeechEngine> = match config
        .fallback_command
        .as_deref()
        .and_then(|command| command_engine(command, config))
    {
        Some(engine) => Arc::new(engine),
        None => Arc::new(LogSpeechEngine),
    };
    (Arc::new(primary), Some(fallback))
}

#[derive(Clone)]
struct Components {
    sources: Vec<Arc<dyn MetadataSource>>,
    bus: Option<Arc<BusEventSource>>,
    speech: Arc<dyn SpeechEngine>,
    fallback_speech: Option<Arc<dyn SpeechEngine>>,
    generator: Option<Arc<dyn CommentaryGenerator>>,
}

struct Running {
    cancel: CancellationToken,
    scheduler: SchedulerHandle,
    tasks: Vec<JoinHandle<()>>,
    arbiter: OutputArbiter,
}

struct Inner {
    initialized: bool,
    bus_notifications: Option<mpsc::Receiver<BusNotification>>,
    running: Option<Running>,
}

/// Bluetooth now-playing monitor
///
/// # Example
///
/// ```rust,no_run
/// use btdj::{Monitor, MonitorConfig};
///
/// # async fn example() -> btdj::Result<()> {
/// let monitor = Monitor::builder()
///     .with_config(MonitorConfig::load()?)
///     .build()?;
///
/// monitor.initialize().await?;
/// let mut events = monitor.subscribe();
/// monitor.start_monitoring().await?;
///
/// while let Some(event) = events.next().await {
///     tracing::info!(kind = event.kind(), device = %event.device(), "event");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Monitor {
    config: MonitorConfig,
    store: DeviceStore,
    events: Arc<EventBus>,
    components: Components,
    inner: Mutex<Inner>,
}

impl Monitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Build a monitor from configuration alone
    pub fn new(config: MonitorConfig) -> Result<Self> {
        MonitorBuilder::new().with_config(config).build()
    }

    /// Seed the device table with one presence check
    ///
    /// Safe to call more than once; only the first call does anything.
    /// [`Monitor::start_monitoring`] calls it when needed.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.lock().initialized {
            return Ok(());
        }

        let mut scheduler = PollingScheduler::new(self.config.scheduler_config());
        for source in &self.components.sources {
            if source.role() == SourceRole::Presence {
                scheduler.add_source(Arc::clone(source));
            }
        }
        let reconciler = self.reconciler()?;
        let observations = scheduler.presence_cycle().await;

        let now = Instant::now();
        for observation in observations {
            reconciler.apply(observation, now);
        }

        self.inner.lock().initialized = true;
        info!(
            devices = self.store.device_count(),
            sources = self.components.sources.len(),
            "Monitor initialized"
        );
        Ok(())
    }

    /// Start every background task
    ///
    /// Fails with [`MonitorError::AlreadyRunning`] if already started.
    pub async fn start_monitoring(&self) -> Result<()> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }
        self.initialize().await?;
        let reconciler = self.reconciler()?;

        let mut inner = self.inner.lock();
        if inner.running.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        self.events.reopen();
        let cancel = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(self.config.observation_buffer);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(reconciler.run(receiver, cancel.clone())));

        let mut scheduler = PollingScheduler::new(self.config.scheduler_config())
            .with_device_store(self.store.clone());
        for source in &self.components.sources {
            scheduler.add_source(Arc::clone(source));
        }
        let scheduler = scheduler.spawn(sender.clone(), cancel.clone());

        if let Some(bus) = &self.components.bus {
            if let Some(notifications) = inner.bus_notifications.take() {
                tasks.push(tokio::spawn(Arc::clone(bus).run(
                    notifications,
                    sender.clone(),
                    cancel.clone(),
                )));
            }
        }
        drop(sender);

        let arbiter = OutputArbiter::new(self.config.arbiter_config());
        let speech_worker = arbiter.spawn(
            Arc::clone(&self.components.speech),
            self.components.fallback_speech.clone(),
            cancel.clone(),
        );
        let speech_worker = match speech_worker {
            Ok(worker) => worker,
            Err(e) => {
                cancel.cancel();
                return Err(e.into());
            }
        };
        tasks.push(speech_worker);

        if self.config.commentary.enabled {
            let mut service = CommentaryService::new(arbiter.clone(), self.store.clone())
                .with_throttle(self.config.comment_throttle)
                .with_timeout(self.config.commentary_timeout);
            if let Some(generator) = &self.components.generator {
                service = service.with_generator(Arc::clone(generator));
            }
            tasks.push(tokio::spawn(
                service.run(self.events.subscribe(), cancel.clone()),
            ));
        }

        inner.running = Some(Running {
            cancel,
            scheduler,
            tasks,
            arbiter,
        });
        info!("Monitoring started");
        Ok(())
    }

    /// Stop every background task and end all current event streams
    ///
    /// An utterance being spoken finishes; queued speech is dropped.
    /// Stopping a monitor that is not running does nothing.
    pub async fn stop_monitoring(&self) -> Result<()> {
        let running = self.inner.lock().running.take();
        let Some(running) = running else {
            debug!("Stop requested while not running");
            return Ok(());
        };

        running.cancel.cancel();
        running.scheduler.join().await;
        for result in join_all(running.tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Monitor task failed");
            }
        }
        // End current streams; later subscriptions see the next run
        self.events.close();
        self.events.reopen();
        info!("Monitoring stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running.is_some()
    }

    /// Queue text on the speech output, bypassing commentary
    ///
    /// Returns how many pending utterances were evicted.
    pub fn announce(&self, text: impl Into<String>) -> Result<usize> {
        let inner = self.inner.lock();
        let running = inner.running.as_ref().ok_or(MonitorError::NotRunning)?;
        Ok(running.arbiter.enqueue(text)?)
    }

    /// Counters of the running speech worker
    pub fn speech_stats(&self) -> Option<Arc<ArbiterStats>> {
        self.inner
            .lock()
            .running
            .as_ref()
            .map(|running| running.arbiter.stats())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn current_track(&self, device: &DeviceId) -> Option<TrackMetadata> {
        self.store.current_track(device)
    }

    /// `Unknown` for devices that are not connected
    pub fn current_state(&self, device: &DeviceId) -> PlaybackState {
        self.store.current_state(device)
    }

    /// Connected devices in connection order
    pub fn connected_devices(&self) -> Vec<DeviceInfo> {
        self.store.connected_devices()
    }

    /// The device commentary follows
    pub fn current_device(&self) -> Option<DeviceId> {
        self.store.current_device()
    }

    /// Subscribe to canonical events
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn reconciler(&self) -> Result<Reconciler> {
        let reconciler = Reconciler::new(
            self.store.clone(),
            Arc::clone(&self.events),
            self.config.reconciler_config(),
        )
        .map_err(ConfigError::from)?;
        Ok(reconciler)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(running) = self.inner.get_mut().running.take() {
            running.cancel.cancel();
        }
    }
}
