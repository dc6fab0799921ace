use std::path::PathBuf;

use anyhow::{Context, Result};
use btdj::logging::{self, LoggingMode};
use btdj::{Monitor, MonitorConfig, MonitorEvent};
use clap::Parser;
use tracing::{info, warn};

/// btdj - a radio DJ for your Bluetooth speaker
///
/// Watches what the connected Bluetooth audio device is playing and
/// comments on track changes out loud.
#[derive(Parser, Debug)]
#[command(name = "btdj")]
#[command(version)]
pub struct Args {
    /// Config file (default: $BTDJ_CONFIG or <config dir>/btdj/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log output: silent, development or debug (default: $BTDJ_LOG_MODE or development)
    #[arg(long)]
    pub log_mode: Option<LoggingMode>,

    /// Log commentary instead of speaking it
    #[arg(long)]
    pub no_speech: bool,

    /// Do not generate commentary at all
    #[arg(long)]
    pub no_commentary: bool,

    /// Text generation endpoint, e.g. http://localhost:11434/api/generate
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Model name sent to the endpoint
    #[arg(long)]
    pub model: Option<String>,

    /// Print every event as a JSON line on stdout
    #[arg(long)]
    pub json_events: bool,

    /// List connected devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Load the config file and apply command-line overrides
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => MonitorConfig::load().context("Failed to load configuration")?,
        };

        if self.no_speech {
            config.speech.enabled = false;
        }
        if self.no_commentary {
            config.commentary.enabled = false;
        }
        if let Some(endpoint) = &self.endpoint {
            config.commentary.endpoint = Some(endpoint.clone());
        }
        if let Some(model) = &self.model {
            config.commentary.model = model.clone();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mode = match args.log_mode {
        Some(mode) => mode,
        None => logging::mode_from_env(LoggingMode::Development)?,
    };
    logging::init_logging(mode)?;

    let config = args.monitor_config()?;
    let monitor = Monitor::new(config).context("Failed to build monitor")?;
    monitor.initialize().await?;

    if args.list_devices {
        let current = monitor.current_device();
        for device in monitor.connected_devices() {
            let marker = if Some(&device.id) == current.as_ref() { "*" } else { " " };
            println!(
                "{} {} {}",
                marker,
                device.id,
                device.name.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let mut events = monitor.subscribe();
    monitor.start_monitoring().await?;
    info!("Listening. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
            event = events.next() => match event {
                Some(event) => report(&event, args.json_events),
                None => break,
            },
        }
    }

    info!("Shutting down");
    if let Some(stats) = monitor.speech_stats() {
        info!(
            spoken = stats.spoken(),
            fallback = stats.fallback(),
            evicted = stats.evicted(),
            failed = stats.failed(),
            "Speech summary"
        );
    }
    monitor.stop_monitoring().await?;
    Ok(())
}

fn report(event: &MonitorEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
        return;
    }

    match event {
        MonitorEvent::TrackChanged { device, current, .. } => {
            info!(%device, artist = %current.artist, title = %current.title, "Now playing");
        }
        MonitorEvent::PlaybackStateChanged {
            device,
            current,
            previous,
            ..
        } => {
            info!(%device, from = previous.as_str(), to = current.as_str(), "Playback state");
        }
        MonitorEvent::DeviceConnected { device, name } => {
            info!(%device, name = name.as_deref().unwrap_or(""), "Device connected");
        }
        MonitorEvent::DeviceDisconnected { device } => {
            info!(%device, "Device disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "btdj",
            "--log-mode",
            "debug",
            "--no-speech",
            "--endpoint",
            "http://localhost:11434/api/generate",
        ])
        .unwrap();

        assert_eq!(args.log_mode, Some(LoggingMode::Debug));
        assert!(args.no_speech);
        assert!(!args.list_devices);
    }

    #[test]
    fn test_invalid_log_mode_is_rejected() {
        assert!(Args::try_parse_from(["btdj", "--log-mode", "loud"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config_file() {
        let path = std::env::temp_dir().join(format!("btdj-daemon-test-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"commentary": {"model": "from-file"}}"#).unwrap();

        let args = Args::try_parse_from([
            "btdj",
            "--config",
            path.to_str().unwrap(),
            "--no-commentary",
            "--no-speech",
        ])
        .unwrap();
        let config = args.monitor_config().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.commentary.model, "from-file");
        assert!(!config.commentary.enabled);
        assert!(!config.speech.enabled);
    }
}
