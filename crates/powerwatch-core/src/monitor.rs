//! The monitor: an owned context object tying the core together.
//!
//! [`Monitor::start`] validates the configuration, builds the shared state,
//! and spawns the stream client as a background task. The handle is what the
//! presentation layer holds: snapshot reads for rendering, typed command
//! methods, an event subscription for connectivity and notices, and a prompt,
//! connection-releasing [`Monitor::shutdown`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use powerwatch_types::{Room, Sample};

use crate::client::StreamClient;
use crate::commands::{CommandGateway, NewRoom};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::events::EventReceiver;
use crate::state::{LinkState, SharedState, StatsSnapshot};

/// Handle to a running telemetry monitor.
///
/// Dropping the handle cancels the background task; prefer
/// [`shutdown`](Self::shutdown) to also wait for the connection to be
/// released.
///
/// # Example
///
/// ```no_run
/// use powerwatch_core::{Monitor, MonitorConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let monitor = Monitor::start(MonitorConfig::new("ws://192.168.4.1:8765"))?;
///
///     for room in monitor.rooms() {
///         println!("{}: {} W threshold", room.name, room.threshold);
///     }
///
///     monitor.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct Monitor {
    state: Arc<SharedState>,
    gateway: CommandGateway,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor").finish_non_exhaustive()
    }
}

impl Monitor {
    /// Validate the configuration and spawn the background stream task.
    ///
    /// Must be called from within a tokio runtime. Fails fast with
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig) on a bad
    /// configuration; connection problems are not errors here, they surface
    /// through [`is_connected`](Self::is_connected) and the event stream.
    pub fn start(config: MonitorConfig) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(SharedState::new(&config));
        let cancel = CancellationToken::new();
        let gateway = CommandGateway::new(Arc::clone(&state), config.thresholds);
        let client = StreamClient::new(config, Arc::clone(&state), cancel.clone());
        let task = tokio::spawn(client.run());

        Ok(Self {
            state,
            gateway,
            cancel,
            task: Some(task),
        })
    }

    /// Snapshot of all rooms in insertion order.
    pub fn rooms(&self) -> Vec<Room> {
        self.state.rooms()
    }

    /// Snapshot of one room.
    pub fn room(&self, id: &str) -> Option<Room> {
        self.state.room(id)
    }

    /// Snapshot of a room's sample series for charting, oldest first.
    pub fn series(&self, room_id: &str) -> Vec<Sample> {
        self.state.series(room_id)
    }

    /// Whether the telemetry link is currently up.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Current link state, for a richer connectivity indicator.
    pub fn link_state(&self) -> LinkState {
        self.state.link_state()
    }

    /// Point-in-time stream statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats()
    }

    /// Subscribe to connectivity events and device notices.
    pub fn subscribe(&self) -> EventReceiver {
        self.state.events.subscribe()
    }

    /// The command gateway, for callers that want to hold it separately.
    pub fn gateway(&self) -> &CommandGateway {
        &self.gateway
    }

    /// See [`CommandGateway::update_threshold`].
    pub fn update_threshold(&self, room_id: &str, threshold: f64) -> Result<()> {
        self.gateway.update_threshold(room_id, threshold)
    }

    /// See [`CommandGateway::reset`].
    pub fn reset(&self, room_id: &str) -> Result<()> {
        self.gateway.reset(room_id)
    }

    /// See [`CommandGateway::add_room`].
    pub fn add_room(&self, new_room: NewRoom) -> Result<()> {
        self.gateway.add_room(new_room)
    }

    /// See [`CommandGateway::remove_room`].
    pub fn remove_room(&self, room_id: &str) -> Result<()> {
        self.gateway.remove_room(room_id)
    }

    /// Stop the background loop and wait for it to release the connection.
    ///
    /// Returns the loop's exit result: `Ok(())` for a clean cancellation,
    /// or the fatal error that already stopped it.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "stream task did not shut down cleanly");
                Ok(())
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        // Ensure the background task stops even if shutdown() was skipped.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let err = Monitor::start(MonitorConfig::new("http://not-a-ws-endpoint")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_fresh_monitor_is_disconnected_and_empty() {
        // Port 9 (discard) is a safe never-connects target.
        let monitor = Monitor::start(MonitorConfig::new("ws://127.0.0.1:9")).unwrap();

        assert!(!monitor.is_connected());
        assert!(monitor.rooms().is_empty());
        assert!(monitor.series("1").is_empty());

        monitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_fail_synchronously_while_disconnected() {
        let monitor = Monitor::start(MonitorConfig::new("ws://127.0.0.1:9")).unwrap();

        let err = monitor.update_threshold("1", 2000.0).unwrap_err();
        assert!(matches!(err, Error::RoomNotFound(_)));

        monitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_is_prompt() {
        let monitor = Monitor::start(MonitorConfig::new("ws://127.0.0.1:9")).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), monitor.shutdown())
            .await
            .expect("shutdown must not hang")
            .unwrap();
    }
}
