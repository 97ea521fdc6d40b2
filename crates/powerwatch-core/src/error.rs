//! Error types for powerwatch-core.
//!
//! # Containment Policy
//!
//! Errors split into three families with different handling:
//!
//! | Family | Variants | Handling |
//! |--------|----------|----------|
//! | transport | [`Error::ConnectionFailed`], [`Error::WebSocket`] | contained in the stream loop, become connectivity status, retried with backoff |
//! | protocol | [`Error::Protocol`] | the offending frame is dropped and logged, connection stays open |
//! | caller-facing | [`Error::ThresholdOutOfRange`], [`Error::RoomNotFound`], [`Error::DuplicateRoom`], [`Error::InvalidCommand`], [`Error::NotConnected`], [`Error::SendFailed`] | surfaced synchronously from command submission, nothing touches the wire |
//!
//! [`Error::InvalidConfig`] is the one fatal case: it is returned before the
//! stream loop starts (or from it, for a malformed endpoint) and is never
//! retried. Transport failures never propagate to the presentation layer as
//! errors; the collaborator observes them through the connectivity flag and
//! the event stream.

use thiserror::Error;

use powerwatch_types::FrameError;

/// Errors that can occur in the telemetry core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Handshake or transport failure while (re)connecting.
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectionFailed {
        /// The endpoint that refused us.
        endpoint: String,
        /// Transport-level reason.
        reason: String,
    },

    /// WebSocket transport error on an established connection.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Malformed or unexpected inbound frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// Command submitted while the link is down. The command is dropped;
    /// there is no outbound queue.
    #[error("not connected to device")]
    NotConnected,

    /// The link was up but the outbound path rejected the command.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Threshold outside the configured valid range.
    #[error("threshold {value} W outside valid range [{min}, {max}] W")]
    ThresholdOutOfRange {
        /// The rejected value.
        value: f64,
        /// Lower bound of the valid range.
        min: f64,
        /// Upper bound of the valid range.
        max: f64,
    },

    /// Command referenced a room the registry does not know.
    #[error("unknown room: {0}")]
    RoomNotFound(String),

    /// Room creation with an identifier that is already registered.
    #[error("room already exists: {0}")]
    DuplicateRoom(String),

    /// Command input failed local validation.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Invalid configuration. Fatal; fix the configuration and restart.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The stream loop was cancelled by its owner.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a connection failure with endpoint context.
    pub fn connection_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a threshold range error.
    pub fn threshold_out_of_range(value: f64, range: powerwatch_types::ThresholdRange) -> Self {
        Self::ThresholdOutOfRange {
            value,
            min: range.min,
            max: range.max,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a command validation error.
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand(message.into())
    }

    /// Whether this error is a local validation failure (nothing reached
    /// the wire).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::ThresholdOutOfRange { .. }
                | Error::RoomNotFound(_)
                | Error::DuplicateRoom(_)
                | Error::InvalidCommand(_)
        )
    }
}

/// Result type alias using powerwatch-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
