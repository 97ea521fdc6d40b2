//! Shared state between the stream loop and the presentation layer.
//!
//! # Access Discipline
//!
//! The stream loop is the only writer to the registry and the window; the
//! presentation layer reads through coarse read locks or snapshot copies.
//! No lock is ever held across an `.await` (all mutation happens in the
//! synchronous sections of the receive loop), so readers are never blocked
//! for longer than an in-memory merge.
//!
//! Lock poisoning is recovered rather than propagated: a poisoned guard means
//! a reader panicked mid-read, which cannot leave the registry or window in a
//! torn state because every write completes before the guard drops.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use powerwatch_types::{Command, Room, Sample};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::events::EventDispatcher;
use crate::registry::RoomRegistry;
use crate::window::TimeWindowBuffer;

/// Connection state of the telemetry link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// No connection; waiting to connect or between backoff attempts.
    Disconnected = 0,
    /// Handshake in progress.
    Connecting = 1,
    /// Link established; frames flow.
    Connected = 2,
    /// Connection lost; per-connection buffering is being torn down.
    Draining = 3,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            3 => LinkState::Draining,
            _ => LinkState::Disconnected,
        }
    }
}

/// Lock-free counters describing the stream's activity.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Text frames received, well-formed or not.
    pub frames_received: AtomicU64,
    /// Telemetry records applied to the registry.
    pub records_applied: AtomicU64,
    /// Frames or records dropped as malformed.
    pub protocol_errors: AtomicU64,
    /// Commands accepted onto the send path.
    pub commands_sent: AtomicU64,
    /// Reconnect attempts scheduled.
    pub reconnect_attempts: AtomicU64,
    /// Connections successfully established.
    pub connections_established: AtomicU64,
}

impl StreamStats {
    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            records_applied: self.records_applied.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
        }
    }
}

/// Serializable point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Text frames received, well-formed or not.
    pub frames_received: u64,
    /// Telemetry records applied to the registry.
    pub records_applied: u64,
    /// Frames or records dropped as malformed.
    pub protocol_errors: u64,
    /// Commands accepted onto the send path.
    pub commands_sent: u64,
    /// Reconnect attempts scheduled.
    pub reconnect_attempts: u64,
    /// Connections successfully established.
    pub connections_established: u64,
}

/// State shared by the stream loop (single writer) and any number of
/// presentation-layer readers.
pub struct SharedState {
    registry: RwLock<RoomRegistry>,
    window: RwLock<TimeWindowBuffer>,
    link_state: AtomicU8,
    outbound: Mutex<Option<mpsc::Sender<Command>>>,
    pub(crate) events: EventDispatcher,
    pub(crate) stats: StreamStats,
}

impl SharedState {
    /// Create shared state sized from the configuration.
    pub(crate) fn new(config: &MonitorConfig) -> Self {
        Self {
            registry: RwLock::new(RoomRegistry::new()),
            window: RwLock::new(TimeWindowBuffer::new(config.window)),
            link_state: AtomicU8::new(LinkState::Disconnected as u8),
            outbound: Mutex::new(None),
            events: EventDispatcher::default(),
            stats: StreamStats::default(),
        }
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.link_state.load(Ordering::SeqCst))
    }

    /// Whether the telemetry link is currently up.
    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }

    pub(crate) fn set_link_state(&self, state: LinkState) {
        self.link_state.store(state as u8, Ordering::SeqCst);
    }

    /// Snapshot of all rooms in insertion order.
    pub fn rooms(&self) -> Vec<Room> {
        self.registry_read().list()
    }

    /// Snapshot of one room.
    pub fn room(&self, id: &str) -> Option<Room> {
        self.registry_read().get(id).cloned()
    }

    /// Snapshot of a room's sample series, oldest first, bounded by the
    /// rolling window as of now.
    pub fn series(&self, room_id: &str) -> Vec<Sample> {
        self.window_read().snapshot(room_id)
    }

    /// Point-in-time stream statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn registry_read(&self) -> RwLockReadGuard<'_, RoomRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn registry_write(&self) -> RwLockWriteGuard<'_, RoomRegistry> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn window_read(&self) -> RwLockReadGuard<'_, TimeWindowBuffer> {
        self.window.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn window_write(&self) -> RwLockWriteGuard<'_, TimeWindowBuffer> {
        self.window.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the outbound sender for a freshly established connection.
    pub(crate) fn install_outbound(&self, sender: mpsc::Sender<Command>) {
        *self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// Tear down per-connection buffering. Pending commands are dropped;
    /// there is no outbound queue across connections.
    pub(crate) fn clear_outbound(&self) {
        *self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Hand a command to the current connection, fire-and-forget.
    ///
    /// Fails synchronously with [`Error::NotConnected`] when the link is
    /// down and [`Error::SendFailed`] when the outbound channel is full;
    /// the command is dropped in both cases.
    pub(crate) fn send_command(&self, command: Command) -> Result<()> {
        let guard = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(Error::NotConnected);
        };
        sender.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => Error::SendFailed("outbound channel full".to_string()),
            TrySendError::Closed(_) => Error::NotConnected,
        })?;
        self.stats.commands_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
