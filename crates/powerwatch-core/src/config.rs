//! Monitor configuration.
//!
//! All operational knobs are supplied here rather than hardcoded: the
//! endpoint, the rolling-window length, the reconnect policy, the valid
//! threshold range, and what to do with telemetry for rooms nobody
//! registered.

use std::time::Duration;

use powerwatch_types::ThresholdRange;

use crate::error::{Error, Result};
use crate::reconnect::ReconnectOptions;

/// Policy for inbound telemetry that references an unknown room id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownRoomPolicy {
    /// Create the room on first sight with default settings. Suits
    /// cloud-facing deployments where the controller is the source of truth
    /// for which rooms exist.
    #[default]
    AutoCreate,
    /// Drop the record. Suits operator-facing deployments where rooms exist
    /// only when explicitly provisioned.
    Ignore,
}

/// Configuration for a [`Monitor`](crate::Monitor).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use powerwatch_core::MonitorConfig;
///
/// let config = MonitorConfig::new("ws://192.168.4.1:8765")
///     .window(Duration::from_secs(60));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// WebSocket endpoint of the cutoff controller (`ws://` or `wss://`).
    pub endpoint: String,
    /// Rolling-window length for per-room sample history.
    pub window: Duration,
    /// Reconnect backoff policy.
    pub reconnect: ReconnectOptions,
    /// Valid range for operator-set thresholds.
    pub thresholds: ThresholdRange,
    /// What to do with telemetry for rooms the registry does not know.
    pub unknown_rooms: UnknownRoomPolicy,
    /// Capacity of the per-connection outbound command channel.
    pub command_buffer: usize,
}

impl MonitorConfig {
    /// Create a configuration for the given endpoint with default settings:
    /// 60 second window, fixed 5 second reconnect delay, threshold range
    /// [100, 10000] W, auto-created unknown rooms.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            window: Duration::from_secs(60),
            reconnect: ReconnectOptions::default(),
            thresholds: ThresholdRange::default(),
            unknown_rooms: UnknownRoomPolicy::default(),
            command_buffer: 16,
        }
    }

    /// Set the rolling-window length.
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the valid threshold range.
    #[must_use]
    pub fn thresholds(mut self, thresholds: ThresholdRange) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the unknown-room policy.
    #[must_use]
    pub fn unknown_rooms(mut self, policy: UnknownRoomPolicy) -> Self {
        self.unknown_rooms = policy;
        self
    }

    /// Set the outbound command channel capacity.
    #[must_use]
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Validate the configuration and return an error if invalid.
    ///
    /// Checks that:
    /// - `endpoint` is a `ws://` or `wss://` URL
    /// - `window` is > 0
    /// - `command_buffer` is > 0
    /// - the threshold range is finite, positive, and ordered
    /// - the reconnect options are internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::invalid_config("endpoint must not be empty"));
        }
        if !self.endpoint.starts_with("ws://") && !self.endpoint.starts_with("wss://") {
            return Err(Error::invalid_config(format!(
                "endpoint '{}' must be a ws:// or wss:// URL",
                self.endpoint
            )));
        }
        if self.window.is_zero() {
            return Err(Error::invalid_config("window must be > 0"));
        }
        if self.command_buffer == 0 {
            return Err(Error::invalid_config("command_buffer must be > 0"));
        }
        if !self.thresholds.min.is_finite() || !self.thresholds.max.is_finite() {
            return Err(Error::invalid_config("threshold range must be finite"));
        }
        if self.thresholds.min <= 0.0 {
            return Err(Error::invalid_config("threshold minimum must be > 0"));
        }
        if self.thresholds.min >= self.thresholds.max {
            return Err(Error::invalid_config(
                "threshold minimum must be below threshold maximum",
            ));
        }
        self.reconnect.validate()
    }
}
