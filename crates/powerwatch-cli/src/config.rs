//! CLI configuration file.
//!
//! A flat TOML file mapped onto [`MonitorConfig`]; every field has a default
//! so a missing file or an empty one is a valid configuration pointing at
//! the controller's stock access-point address.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use powerwatch_core::{MonitorConfig, ReconnectOptions, UnknownRoomPolicy};
use powerwatch_types::ThresholdRange;

/// On-disk configuration.
///
/// ```toml
/// endpoint = "ws://192.168.4.1:8765"
/// window_secs = 60
/// backoff_secs = 5
/// threshold_min = 100.0
/// threshold_max = 10000.0
/// unknown_rooms = "auto_create"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// WebSocket endpoint of the cutoff controller.
    pub endpoint: String,
    /// Rolling-window length in seconds.
    pub window_secs: u64,
    /// Fixed reconnect delay in seconds.
    pub backoff_secs: u64,
    /// Lowest accepted threshold in watts.
    pub threshold_min: f64,
    /// Highest accepted threshold in watts.
    pub threshold_max: f64,
    /// What to do with telemetry for unregistered rooms.
    pub unknown_rooms: UnknownRoomsSetting,
}

/// Serializable mirror of [`UnknownRoomPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRoomsSetting {
    /// Register rooms on first sight in telemetry.
    AutoCreate,
    /// Drop telemetry for unregistered rooms.
    Ignore,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            // The controller's stock AP address.
            endpoint: "ws://192.168.4.1:8765".to_string(),
            window_secs: 60,
            backoff_secs: 5,
            threshold_min: 100.0,
            threshold_max: 10_000.0,
            unknown_rooms: UnknownRoomsSetting::AutoCreate,
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.as_ref().display()))
    }

    /// Map onto the core configuration.
    pub fn into_monitor_config(self) -> MonitorConfig {
        let policy = match self.unknown_rooms {
            UnknownRoomsSetting::AutoCreate => UnknownRoomPolicy::AutoCreate,
            UnknownRoomsSetting::Ignore => UnknownRoomPolicy::Ignore,
        };
        MonitorConfig::new(self.endpoint)
            .window(Duration::from_secs(self.window_secs))
            .reconnect(ReconnectOptions::fixed_delay(Duration::from_secs(
                self.backoff_secs,
            )))
            .thresholds(ThresholdRange::new(self.threshold_min, self.threshold_max))
            .unknown_rooms(policy)
    }
}
