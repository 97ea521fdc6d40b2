//! Event system for connectivity and device notices.
//!
//! The stream loop publishes events on a broadcast channel so the
//! presentation layer can show a connectivity indicator and transient
//! notices without ever seeing a transport error as an exception. Lagging
//! subscribers lose old events; publishers never block.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use powerwatch_types::Notice;

/// Events emitted by the monitor.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum MonitorEvent {
    /// The telemetry link is up.
    Connected {
        /// Endpoint we connected to.
        endpoint: String,
    },
    /// The telemetry link went down.
    Disconnected {
        /// Why the link dropped.
        reason: DisconnectReason,
    },
    /// A reconnection attempt has been scheduled.
    ReconnectScheduled {
        /// 1-based attempt counter since the last successful connection.
        attempt: u32,
        /// How long until the attempt.
        delay: Duration,
    },
    /// The device sent an acknowledgement or operator notice.
    Notice {
        /// The notice payload, verbatim.
        notice: Notice,
    },
}

/// Reason for a disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The peer closed the connection.
    PeerClosed,
    /// Transport-level failure.
    TransportError(String),
    /// The monitor's owner requested shutdown.
    Cancelled,
}

/// Sender for monitor events.
pub type EventSender = broadcast::Sender<MonitorEvent>;

/// Receiver for monitor events.
pub type EventReceiver = broadcast::Receiver<MonitorEvent>;

/// Event dispatcher fanning events out to all subscribers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a dispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn send(&self, event: MonitorEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
