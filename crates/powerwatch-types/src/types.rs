//! Core types for room power monitoring.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Cutoff threshold in watts assigned to rooms created implicitly from
/// inbound telemetry, before an operator has configured one.
pub const DEFAULT_THRESHOLD_WATTS: f64 = 2500.0;

/// A monitored electrical circuit with a configurable cutoff threshold.
///
/// Room identifiers are unique and stable for the lifetime of a session;
/// an id is never reused after the room is deleted. The status fields
/// (`cutoff_active`, `bypass_detected`) always reflect the most recent
/// inbound telemetry for this room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Unique stable identifier.
    pub id: String,
    /// Operator-settable display label (no uniqueness constraint).
    pub name: String,
    /// Power value in watts above which the device cuts power.
    pub threshold: f64,
    /// Last-known device-reported cutoff state.
    pub cutoff_active: bool,
    /// Last-known device-reported bypass anomaly flag.
    pub bypass_detected: bool,
    /// Hardware measurement channel, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_pin: Option<u8>,
    /// Hardware cutoff channel, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_pin: Option<u8>,
}

impl Room {
    /// Create a room with explicit name and threshold and clear status flags.
    pub fn new(id: impl Into<String>, name: impl Into<String>, threshold: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            threshold,
            cutoff_active: false,
            bypass_detected: false,
            measurement_pin: None,
            cutoff_pin: None,
        }
    }

    /// Create a room known only by its id, as when first seen in inbound
    /// telemetry: the id doubles as the display name and the threshold is
    /// [`DEFAULT_THRESHOLD_WATTS`].
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, DEFAULT_THRESHOLD_WATTS)
    }

    /// Attach hardware channel identifiers.
    #[must_use]
    pub fn with_pins(mut self, measurement_pin: u8, cutoff_pin: u8) -> Self {
        self.measurement_pin = Some(measurement_pin);
        self.cutoff_pin = Some(cutoff_pin);
        self
    }
}

/// A single power measurement.
///
/// Samples are immutable once recorded: they are only ever appended to a
/// room's series or evicted by age, never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall-clock capture time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Measured power in watts.
    pub power: f64,
}

impl Sample {
    /// Create a sample with an explicit capture time.
    pub fn new(timestamp: OffsetDateTime, power: f64) -> Self {
        Self { timestamp, power }
    }

    /// Create a sample captured now.
    pub fn now(power: f64) -> Self {
        Self::new(OffsetDateTime::now_utc(), power)
    }
}

/// Inclusive bounds for operator-settable cutoff thresholds.
///
/// # Example
///
/// ```
/// use powerwatch_types::ThresholdRange;
///
/// let range = ThresholdRange::default();
/// assert!(range.contains(2500.0));
/// assert!(!range.contains(50.0));
/// assert!(!range.contains(f64::NAN));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// Lowest accepted threshold in watts.
    pub min: f64,
    /// Highest accepted threshold in watts.
    pub max: f64,
}

impl Default for ThresholdRange {
    fn default() -> Self {
        Self {
            min: 100.0,
            max: 10_000.0,
        }
    }
}

impl ThresholdRange {
    /// Create a range with explicit bounds.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check whether a threshold value is acceptable.
    ///
    /// Non-finite values are never acceptable.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}
