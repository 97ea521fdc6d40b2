use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use powerwatch_core::{Monitor, MonitorConfig, MonitorEvent, NewRoom};

mod config;

use config::FileConfig;

/// How long command subcommands wait for the link before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How long command subcommands linger for a device acknowledgement.
const ACK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "powerwatch")]
#[command(author, version, about = "Room power telemetry dashboard and control", long_about = None)]
struct Cli {
    /// WebSocket endpoint of the cutoff controller (overrides the config file)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow live telemetry and print a room status table
    Watch {
        /// Refresh interval in seconds
        #[arg(short, long, default_value = "2")]
        interval: u64,
    },

    /// Update a room's cutoff threshold
    SetThreshold {
        /// Room identifier
        room: String,
        /// New threshold in watts
        threshold: f64,
    },

    /// Clear a room's cutoff/bypass state and let the device re-evaluate
    Reset {
        /// Room identifier
        room: String,
    },

    /// Provision a new monitored room
    AddRoom {
        /// Identifier for the new room
        id: String,
        /// Display label
        name: String,
        /// Cutoff threshold in watts
        #[arg(short, long, default_value = "2500.0")]
        threshold: f64,
        /// Measurement relay GPIO pin
        #[arg(long, default_value = "25")]
        meas_pin: u8,
        /// Cutoff relay GPIO pin
        #[arg(long, default_value = "26")]
        cutoff_pin: u8,
    },

    /// Delete a room and stop monitoring its channel
    RemoveRoom {
        /// Room identifier
        room: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Watch { interval } => watch(config, interval).await,
        Commands::SetThreshold { room, threshold } => {
            with_connected_monitor(config, |monitor| monitor.update_threshold(&room, threshold))
                .await
        }
        Commands::Reset { room } => {
            with_connected_monitor(config, |monitor| monitor.reset(&room)).await
        }
        Commands::AddRoom {
            id,
            name,
            threshold,
            meas_pin,
            cutoff_pin,
        } => {
            with_connected_monitor(config, move |monitor| {
                monitor.add_room(NewRoom {
                    id,
                    name,
                    threshold,
                    measurement_pin: meas_pin,
                    cutoff_pin,
                })
            })
            .await
        }
        Commands::RemoveRoom { room } => {
            with_connected_monitor(config, |monitor| monitor.remove_room(&room)).await
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<MonitorConfig> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let mut config = file.into_monitor_config();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(config)
}

/// Follow telemetry until Ctrl-C, printing a status table each tick.
async fn watch(config: MonitorConfig, interval: u64) -> Result<()> {
    let monitor = Monitor::start(config)?;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => print_status(&monitor),
        }
    }

    tracing::info!("shutting down");
    monitor.shutdown().await?;
    Ok(())
}

fn print_status(monitor: &Monitor) {
    let stats = monitor.stats();
    let link = if monitor.is_connected() {
        "connected"
    } else {
        "disconnected"
    };
    println!("link: {link} ({} frames, {} records)", stats.frames_received, stats.records_applied);

    let rooms = monitor.rooms();
    if rooms.is_empty() {
        println!("  (no rooms yet)");
        return;
    }
    for room in rooms {
        let series = monitor.series(&room.id);
        let latest = series
            .last()
            .map(|sample| format!("{:8.1} W", sample.power))
            .unwrap_or_else(|| "      -- W".to_string());
        let mut flags = String::new();
        if room.cutoff_active {
            flags.push_str("  CUTOFF");
        }
        if room.bypass_detected {
            flags.push_str("  BYPASS");
        }
        println!(
            "  {:<6} {:<24} {latest}  threshold {:6.0} W  {:>3} samples{flags}",
            room.id,
            room.name,
            room.threshold,
            series.len(),
        );
    }
    println!();
}

/// Start a monitor, wait for the link, run one gateway action, and linger
/// briefly for the device's acknowledgement notice.
async fn with_connected_monitor<F>(config: MonitorConfig, action: F) -> Result<()>
where
    F: FnOnce(&Monitor) -> powerwatch_core::Result<()>,
{
    let monitor = Monitor::start(config)?;
    let mut events = monitor.subscribe();

    // The connectivity flag is authoritative; events alone could already
    // have fired before this subscription existed.
    let connected = timeout(CONNECT_TIMEOUT, async {
        while !monitor.is_connected() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if connected.is_err() {
        let _ = monitor.shutdown().await;
        bail!("could not reach the controller within {CONNECT_TIMEOUT:?}");
    }

    action(&monitor)?;

    // Acknowledgements are best-effort; print one if it arrives in time.
    if let Ok(Ok(MonitorEvent::Notice { notice })) = timeout(ACK_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event @ MonitorEvent::Notice { .. }) => break Ok(event),
                Ok(_) => {}
                Err(err) => break Err(err),
            }
        }
    })
    .await
    {
        println!("device: [{:?}] {}", notice.status, notice.message);
    }

    monitor.shutdown().await?;
    Ok(())
}
