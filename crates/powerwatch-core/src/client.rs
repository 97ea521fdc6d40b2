//! The stream client: one long-lived duplex link to the cutoff controller.
//!
//! The client is an explicit state machine over [`LinkState`]:
//!
//! ```text
//! DISCONNECTED -> CONNECTING -> CONNECTED -> DRAINING -> DISCONNECTED
//!       ^                                                     |
//!       +------------------ backoff delay --------------------+
//! ```
//!
//! The loop runs until its owner cancels it. A failed handshake or a dropped
//! connection schedules a retry after the configured backoff; registry and
//! window contents survive reconnects untouched (only per-connection
//! buffering is discarded), so history simply has a gap where the link was
//! down. The one fatal case is a malformed endpoint, which is surfaced from
//! [`StreamClient::run`] and never retried.
//!
//! Inbound and outbound traffic share the single connection: commands are
//! funneled through a bounded per-connection channel and written between
//! inbound frames, preserving frame ordering on the wire.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::{SinkExt, StreamExt};
use time::OffsetDateTime;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use powerwatch_types::{InboundFrame, RoomStatus, Sample};

use crate::config::{MonitorConfig, UnknownRoomPolicy};
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, MonitorEvent};
use crate::registry::RoomPatch;
use crate::state::{LinkState, SharedState};
use crate::validation::{StatusVerdict, check_status};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Background client driving the telemetry link.
pub struct StreamClient {
    config: MonitorConfig,
    state: Arc<SharedState>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Create a client over the given shared state.
    ///
    /// The configuration is assumed validated (see
    /// [`MonitorConfig::validate`]); [`Monitor::start`](crate::Monitor::start)
    /// does this before spawning the client.
    pub fn new(config: MonitorConfig, state: Arc<SharedState>, cancel: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel,
        }
    }

    /// Run the connect/receive loop until cancelled.
    ///
    /// Returns `Ok(())` on cancellation. Returns an error only for fatal
    /// local conditions (malformed endpoint, or a configured attempt limit
    /// exhausted); transport failures are contained and retried.
    pub async fn run(self) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.state.set_link_state(LinkState::Disconnected);
                return Ok(());
            }

            self.state.set_link_state(LinkState::Connecting);
            // Race the handshake against cancellation so shutdown stays
            // prompt even while a connect is pending.
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.state.set_link_state(LinkState::Disconnected);
                    return Ok(());
                }
                result = connect_async(self.config.endpoint.as_str()) => result,
            };
            match connected {
                Ok((socket, _response)) => {
                    attempt = 0;
                    self.state
                        .stats
                        .connections_established
                        .fetch_add(1, Ordering::Relaxed);
                    self.state.set_link_state(LinkState::Connected);
                    self.state.events.send(MonitorEvent::Connected {
                        endpoint: self.config.endpoint.clone(),
                    });
                    info!(endpoint = %self.config.endpoint, "telemetry link established");

                    let reason = self.drive(socket).await;

                    self.state.set_link_state(LinkState::Draining);
                    self.state.clear_outbound();
                    self.state.set_link_state(LinkState::Disconnected);
                    self.state.events.send(MonitorEvent::Disconnected {
                        reason: reason.clone(),
                    });

                    if reason == DisconnectReason::Cancelled {
                        return Ok(());
                    }
                    warn!(endpoint = %self.config.endpoint, ?reason, "telemetry link lost");
                }
                Err(err) if is_fatal(&err) => {
                    self.state.set_link_state(LinkState::Disconnected);
                    return Err(Error::connection_failed(
                        &self.config.endpoint,
                        err.to_string(),
                    ));
                }
                Err(err) => {
                    self.state.set_link_state(LinkState::Disconnected);
                    debug!(endpoint = %self.config.endpoint, error = %err, "connect attempt failed");
                }
            }

            attempt += 1;
            if let Some(max) = self.config.reconnect.max_attempts
                && attempt > max
            {
                return Err(Error::connection_failed(
                    &self.config.endpoint,
                    format!("gave up after {max} attempts"),
                ));
            }

            self.state
                .stats
                .reconnect_attempts
                .fetch_add(1, Ordering::Relaxed);
            let delay = self.config.reconnect.delay_for_attempt(attempt - 1);
            self.state
                .events
                .send(MonitorEvent::ReconnectScheduled { attempt, delay });
            debug!(attempt, ?delay, "reconnect scheduled");

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.state.set_link_state(LinkState::Disconnected);
                    return Ok(());
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// Drive one established connection until it drops or the client is
    /// cancelled. The socket is consumed; it is closed (or dropped, which
    /// closes it) on every exit path.
    async fn drive(&self, mut socket: WsStream) -> DisconnectReason {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(self.config.command_buffer);
        self.state.install_outbound(cmd_tx);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = socket.close(None).await;
                    return DisconnectReason::Cancelled;
                }
                maybe_command = cmd_rx.recv() => {
                    let Some(command) = maybe_command else {
                        // Sender slot cleared under us; treat as teardown.
                        return DisconnectReason::Cancelled;
                    };
                    let text = match command.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize command, dropping");
                            continue;
                        }
                    };
                    if let Err(err) = socket.send(Message::Text(text)).await {
                        return DisconnectReason::TransportError(err.to_string());
                    }
                    debug!(verb = command.verb(), room = command.room_id(), "command sent");
                }
                message = socket.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Ping(payload))) => {
                            if socket.send(Message::Pong(payload)).await.is_err() {
                                return DisconnectReason::TransportError(
                                    "failed to answer ping".to_string(),
                                );
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Binary(_))) => {
                            self.state
                                .stats
                                .protocol_errors
                                .fetch_add(1, Ordering::Relaxed);
                            warn!("dropping unexpected binary frame");
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return DisconnectReason::PeerClosed;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            return DisconnectReason::TransportError(err.to_string());
                        }
                    }
                }
            }
        }
    }

    /// Decode and dispatch one inbound text frame.
    ///
    /// A malformed frame is dropped with a warning; it is never fatal for
    /// the connection.
    fn handle_frame(&self, text: &str) {
        self.state
            .stats
            .frames_received
            .fetch_add(1, Ordering::Relaxed);

        match InboundFrame::parse(text) {
            Ok(InboundFrame::Telemetry(records)) => {
                let now = OffsetDateTime::now_utc();
                for record in records {
                    self.apply_status(record, now);
                }
            }
            Ok(InboundFrame::Notice(notice)) => {
                info!(status = ?notice.status, message = %notice.message, "device notice");
                self.state.events.send(MonitorEvent::Notice { notice });
            }
            Err(err) => {
                self.state
                    .stats
                    .protocol_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "dropping malformed frame");
            }
        }
    }

    /// Apply one telemetry record: merge status flags into the registry and
    /// append the power sample, honoring the unknown-room policy.
    fn apply_status(&self, status: RoomStatus, now: OffsetDateTime) {
        match check_status(&status) {
            StatusVerdict::Reject(reason) => {
                self.state
                    .stats
                    .protocol_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!(%reason, "dropping telemetry record");
                return;
            }
            StatusVerdict::Accept(warnings) => {
                for warning in &warnings {
                    warn!(room = %status.id, %warning, "suspicious telemetry record");
                }
            }
        }

        {
            let mut registry = self.state.registry_write();
            if !registry.contains(&status.id) {
                match self.config.unknown_rooms {
                    UnknownRoomPolicy::AutoCreate => {
                        debug!(room = %status.id, "auto-creating room from telemetry");
                    }
                    UnknownRoomPolicy::Ignore => {
                        debug!(room = %status.id, "ignoring telemetry for unknown room");
                        return;
                    }
                }
            }
            registry.upsert(&status.id, &RoomPatch::from_status(&status));
        }

        self.state
            .window_write()
            .append_at(&status.id, Sample::new(now, status.power), now);
        self.state
            .stats
            .records_applied
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// Whether a connect error is a local configuration problem that retrying
/// cannot fix.
fn is_fatal(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Url(_))
}
