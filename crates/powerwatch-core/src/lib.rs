//! Telemetry ingestion and rolling-window aggregation core for room power
//! monitoring.
//!
//! This crate is the systems core underneath a live power dashboard: it owns
//! one long-lived duplex WebSocket connection to a remote cutoff controller,
//! ingests per-room measurement batches into a bounded rolling window,
//! tracks threshold-cutoff and bypass status per room, and carries validated
//! control commands back over the same connection, all while tolerating
//! disconnects without corrupting or wiping accumulated state.
//!
//! # Features
//!
//! - **Room registry**: insertion-ordered, field-merge updates so telemetry
//!   never clobbers operator settings
//! - **Rolling window**: per-room sample history bounded by age (default 60 s)
//! - **Auto-reconnection**: explicit connection state machine with
//!   configurable backoff
//! - **Command gateway**: validated verbs (threshold update, reset,
//!   add/remove room) over the shared connection
//! - **Events**: broadcast connectivity changes and device notices to any
//!   number of subscribers
//!
//! # Quick Start
//!
//! ```no_run
//! use powerwatch_core::{Monitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = Monitor::start(MonitorConfig::new("ws://192.168.4.1:8765"))?;
//!
//!     // The presentation layer polls at its own cadence.
//!     for room in monitor.rooms() {
//!         let series = monitor.series(&room.id);
//!         println!("{}: {} samples", room.name, series.len());
//!     }
//!
//!     // Operator actions go through the validated gateway.
//!     if monitor.is_connected() {
//!         monitor.update_threshold("1", 1800.0)?;
//!     }
//!
//!     monitor.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod reconnect;
pub mod registry;
pub mod state;
pub mod validation;
pub mod window;

// Core exports
pub use client::StreamClient;
pub use commands::{CommandGateway, NewRoom};
pub use config::{MonitorConfig, UnknownRoomPolicy};
pub use error::{Error, Result};
pub use events::{DisconnectReason, EventDispatcher, EventReceiver, EventSender, MonitorEvent};
pub use monitor::Monitor;
pub use reconnect::ReconnectOptions;
pub use registry::{RoomPatch, RoomRegistry};
pub use state::{LinkState, SharedState, StatsSnapshot, StreamStats};
pub use validation::{StatusVerdict, StatusWarning, check_status};
pub use window::TimeWindowBuffer;

// Re-export the wire contract types for downstream convenience
pub use powerwatch_types::{
    AckStatus, Command, InboundFrame, Notice, Room, RoomStatus, Sample, ThresholdRange,
};
