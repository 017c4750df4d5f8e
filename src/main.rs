//! # Sail Telemetry
//!
//! Ground-station companion for the RC sailing boat's telemetry link.
//!
//! Lists serial ports, monitors the live link (optionally recording CSV),
//! sends single commands and inspects recorded logs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use sail_telemetry::catalog::SignalCatalog;
use sail_telemetry::config::Config;
use sail_telemetry::link::{CommandSender, ConnectionMonitor, LinkControl, LinkEvent, LinkReader};
use sail_telemetry::serial::{self, shared, SerialLink};
use sail_telemetry::store::TimeSeriesStore;
use sail_telemetry::telemetry::{replay, SessionLogger, SignalStats};

/// Config file read when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Period of the monitor's status line
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "sail-telemetry", version, about = "RC sailing boat telemetry link")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Stream live telemetry until Ctrl+C
    Monitor {
        /// Serial port (defaults to the configured port, then the first one found)
        #[arg(short, long)]
        port: Option<String>,
        /// Record a CSV session log
        #[arg(long)]
        log: bool,
        /// Signals to show and record (defaults to the catalog's signals)
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },
    /// Send one command to the boat
    Send {
        #[arg(short, long)]
        port: Option<String>,
        key: String,
        value: String,
    },
    /// Summarize a recorded CSV log
    Replay { file: PathBuf },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

/// Explicit port, configured port, or the first port that opens
async fn connect(control: &LinkControl, port: Option<&str>, config: &Config) -> Result<String> {
    let configured = (!config.serial.port.is_empty()).then_some(config.serial.port.as_str());

    match port.or(configured) {
        Some(endpoint) => {
            control.connect(endpoint).await?;
            Ok(endpoint.to_string())
        }
        None => {
            let ports = control.ports().await?;
            Ok(control.connect_any(&ports).await?)
        }
    }
}

fn format_latest(store: &TimeSeriesStore, keys: &[String]) -> String {
    store
        .latest_many(keys, true)
        .iter()
        .zip(keys)
        .map(|(sample, key)| match sample {
            Some(s) => format!("{}={:.2}", key, s.value),
            None => format!("{}=-", key),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Operator-facing text for link events worth a warning
fn describe_event(event: &LinkEvent) -> Option<String> {
    match event {
        LinkEvent::Disconnected { endpoint, reason } => Some(format!(
            "Link on {} closed ({:?}); monitor is idle until restarted",
            endpoint, reason
        )),
        LinkEvent::TransportError { message } => Some(format!("Transport error: {}", message)),
        LinkEvent::Connected { .. } => None,
    }
}

/// Write one CSV row; a failed write ends the session
fn record_or_stop(logger: &mut SessionLogger, store: &TimeSeriesStore) -> bool {
    let Err(e) = logger.record(store) else {
        return true;
    };
    warn!("Stopping CSV log: {}", e);
    if let Err(e) = logger.stop() {
        warn!("Failed to close CSV log: {}", e);
    }
    false
}

fn list_ports() -> Result<()> {
    let ports = serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

async fn monitor(config: Config, port: Option<String>, log: bool, keys: Vec<String>) -> Result<()> {
    let catalog = SignalCatalog::load(&config.catalog.path);
    let keys: Vec<String> = if keys.is_empty() {
        catalog.keys().map(str::to_string).collect()
    } else {
        keys
    };

    let transport = shared(SerialLink::from_config(&config.serial));
    let link_monitor = ConnectionMonitor::new(config.link.heartbeat_timeout());
    let store = TimeSeriesStore::new(config.store.max_points);
    let mut events = link_monitor.subscribe();

    let reader = LinkReader::from_config(transport, link_monitor, store.clone(), &config);
    let handle = reader.spawn();
    let control = handle.control().clone();

    let endpoint = connect(&control, port.as_deref(), &config).await?;
    info!("Monitoring {} (Ctrl+C to stop)", endpoint);

    let mut logger = SessionLogger::new(config.logging.include_padding);
    if log {
        let path = logger.start_in_dir(&config.logging.log_dir, &keys)?;
        info!("Recording to {}", path.display());
    }

    let mut record_tick = interval(config.logging.record_interval());
    record_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pad_tick = interval(config.store.stale_after());
    let mut status_tick = interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            _ = record_tick.tick(), if logger.is_active() => {
                record_or_stop(&mut logger, &store);
            }

            _ = pad_tick.tick() => {
                store.pad_all_stale(store.elapsed(), config.store.stale_after());
            }

            _ = status_tick.tick() => {
                let status = if control.monitor().is_healthy() {
                    "healthy"
                } else if control.monitor().is_connected() {
                    "no heartbeat"
                } else {
                    "disconnected"
                };
                println!("[{}] {}", status, format_latest(&store, &keys));
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(message) = describe_event(&event) {
                        warn!("{}", message);
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("Missed {} link events", missed),
                Err(RecvError::Closed) => break,
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if logger.is_active() {
        let rows = logger.stop()?;
        info!("Recorded {} rows", rows);
    }
    handle.stop().await;
    Ok(())
}

async fn send(config: Config, port: Option<String>, key: &str, value: &str) -> Result<()> {
    let transport = shared(SerialLink::from_config(&config.serial));
    let link_monitor = ConnectionMonitor::new(config.link.heartbeat_timeout());
    let control = LinkControl::new(transport.clone(), link_monitor.clone(), TimeSeriesStore::default());
    let sender = CommandSender::new(transport, link_monitor);

    let endpoint = connect(&control, port.as_deref(), &config).await?;
    let result = sender.send_text(key, value).await;
    control.disconnect().await;

    let line = result?;
    println!("Sent {} to {}", line.trim_end(), endpoint);
    Ok(())
}

fn summarize(config: &Config, file: &Path) -> Result<()> {
    let (store, rows) = replay::load_store(file, config.store.max_points)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let catalog = SignalCatalog::load(&config.catalog.path);

    println!("{}: {} rows, {} signals", file.display(), rows, store.keys().len());
    let snapshot = store.snapshot();
    for key in snapshot.keys() {
        let Some(history) = snapshot.get(key) else { continue };
        let stats = SignalStats::from_history(history);
        let last = history.latest().map_or_else(|| "-".to_string(), |s| format!("{:.2}", s.value));
        let rate = stats.rate_hz.map_or_else(|| "-".to_string(), |r| format!("{:.2} Hz", r));
        let jitter = stats.jitter.map_or_else(|| "-".to_string(), |j| format!("{:.6} s", j));
        println!(
            "  {:<6} {:<24} samples={:<6} last={:<10} rate={:<12} jitter={}",
            key,
            catalog.name(key),
            stats.samples,
            last,
            rate,
            jitter
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ports => list_ports(),
        Command::Monitor { port, log, keys } => {
            info!("Sail Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));
            monitor(config, port, log, keys).await
        }
        Command::Send { port, key, value } => send(config, port, &key, &value).await,
        Command::Replay { file } => summarize(&config, &file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_monitor_keys_are_comma_separated() {
        let cli = Cli::try_parse_from(["sail-telemetry", "monitor", "--log", "--keys", "ROL,PIT,YAW"]).unwrap();
        match cli.command {
            Command::Monitor { port, log, keys } => {
                assert_eq!(port, None);
                assert!(log);
                assert_eq!(keys, vec!["ROL", "PIT", "YAW"]);
            }
            other => panic!("Expected monitor, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_send_accepts_negative_value() {
        let cli = Cli::try_parse_from(["sail-telemetry", "send", "-p", "COM3", "RUD", "--", "-12.5"]).unwrap();
        match cli.command {
            Command::Send { port, key, value } => {
                assert_eq!(port.as_deref(), Some("COM3"));
                assert_eq!(key, "RUD");
                assert_eq!(value, "-12.5");
            }
            other => panic!("Expected send, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_config() {
        let cli = Cli::try_parse_from(["sail-telemetry", "replay", "log.csv", "--config", "boat.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("boat.toml")));
        assert!(matches!(cli.command, Command::Replay { .. }));
    }

    #[test]
    fn test_format_latest_marks_missing_signals() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 1.5, 0.0);
        let keys = vec!["ROL".to_string(), "PIT".to_string()];
        assert_eq!(format_latest(&store, &keys), "ROL=1.50 PIT=-");
    }

    #[test]
    fn test_disconnect_message_has_no_reconnect_hint() {
        let event = LinkEvent::Disconnected {
            endpoint: "COM3".to_string(),
            reason: sail_telemetry::link::DisconnectReason::TransportError,
        };
        let message = describe_event(&event).unwrap();
        assert!(message.contains("COM3"));
        assert!(message.contains("idle"));
        assert!(!message.contains("toggle"));
        assert_eq!(describe_event(&LinkEvent::Connected { endpoint: "COM3".to_string() }), None);
    }

    /// Accepts the header, then fails every write
    struct BrokenAfterHeader(bool);

    impl std::io::Write for BrokenAfterHeader {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "disk full"));
            }
            self.0 = true;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_record_failure_ends_session() {
        let store = TimeSeriesStore::new(10);
        store.append("ROL", 1.5, 0.0);
        let mut logger = SessionLogger::default();
        logger.start(BrokenAfterHeader(false), &["ROL"]).unwrap();

        assert!(!record_or_stop(&mut logger, &store));
        assert!(!logger.is_active());
        assert!(!record_or_stop(&mut logger, &store));
    }

    #[test]
    fn test_record_success_keeps_session() {
        let store = TimeSeriesStore::new(10);
        let mut logger = SessionLogger::default();
        logger.start(std::io::sink(), &["ROL"]).unwrap();

        assert!(record_or_stop(&mut logger, &store));
        assert_eq!(logger.row_count(), 1);
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/config.toml"))).is_err());
    }
}
