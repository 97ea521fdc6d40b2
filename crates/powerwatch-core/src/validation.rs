//! Sanity checks for inbound telemetry records.
//!
//! The controller is an embedded device on a flaky link; a garbage power
//! value must not poison the registry or the charts. Records that cannot be
//! meaningful (non-finite or negative power) are rejected outright, while
//! merely implausible values pass with a warning for the logs.

use powerwatch_types::RoomStatus;

/// Power draw above which a reading is considered implausible for a single
/// residential circuit (1 MW).
pub const IMPLAUSIBLE_POWER_WATTS: f64 = 1_000_000.0;

/// Warnings attached to an accepted record.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StatusWarning {
    /// Power is far beyond anything a monitored circuit can draw.
    ImplausiblePower {
        /// The reported value.
        value: f64,
    },
}

impl std::fmt::Display for StatusWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusWarning::ImplausiblePower { value } => {
                write!(f, "power {value} W exceeds {IMPLAUSIBLE_POWER_WATTS} W")
            }
        }
    }
}

/// Verdict on a single telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusVerdict {
    /// Apply the record.
    Accept(Vec<StatusWarning>),
    /// Drop the record; the value cannot be a measurement.
    Reject(String),
}

impl StatusVerdict {
    /// Whether the record should be applied.
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, StatusVerdict::Accept(_))
    }
}

/// Validate an inbound status record.
pub fn check_status(status: &RoomStatus) -> StatusVerdict {
    if !status.power.is_finite() {
        return StatusVerdict::Reject(format!(
            "room {}: power is not a finite number",
            status.id
        ));
    }
    if status.power < 0.0 {
        return StatusVerdict::Reject(format!(
            "room {}: negative power {} W",
            status.id, status.power
        ));
    }

    let mut warnings = Vec::new();
    if status.power > IMPLAUSIBLE_POWER_WATTS {
        warnings.push(StatusWarning::ImplausiblePower {
            value: status.power,
        });
    }
    StatusVerdict::Accept(warnings)
}
