//! Wire frames exchanged with the cutoff controller.
//!
//! Inbound text frames are classified by shape with [`InboundFrame::parse`]
//! before any state is touched: a JSON array is a telemetry batch, an object
//! carrying a `status` field is a notice, and everything else fails closed so
//! the caller can drop the frame without tearing down the connection.
//!
//! Field name variants observed across controller firmware revisions
//! (`display_power`/`power`, `isCutoff`/`cutoff`, `bypassDetected`/`bypass`)
//! are accepted via serde aliases.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Per-room status record inside an inbound telemetry batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStatus {
    /// Room identifier the record applies to.
    pub id: String,
    /// Instantaneous power draw in watts.
    #[serde(alias = "display_power")]
    pub power: f64,
    /// Device-reported cutoff state.
    #[serde(alias = "isCutoff")]
    pub cutoff: bool,
    /// Device-reported bypass anomaly flag.
    #[serde(alias = "bypassDetected")]
    pub bypass: bool,
}

/// Severity of a device notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// The device accepted the command.
    Success,
    /// The device rejected the command or hit an internal error.
    Error,
}

/// A single-object acknowledgement/notice frame.
///
/// Notices are surfaced to the collaborator layer as-is; they never mutate
/// room state themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Outcome reported by the device.
    pub status: AckStatus,
    /// Human-readable message for the operator.
    pub message: String,
}

/// An inbound frame classified into one of the known message kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A batch of per-room status records.
    Telemetry(Vec<RoomStatus>),
    /// A command acknowledgement or operator notice.
    Notice(Notice),
}

impl InboundFrame {
    /// Classify a raw text frame.
    ///
    /// # Example
    ///
    /// ```
    /// use powerwatch_types::InboundFrame;
    ///
    /// let frame = InboundFrame::parse(
    ///     r#"[{"id":"1","display_power":2600.0,"isCutoff":true,"bypassDetected":false}]"#,
    /// )
    /// .unwrap();
    /// let InboundFrame::Telemetry(records) = frame else {
    ///     panic!("expected telemetry");
    /// };
    /// assert_eq!(records[0].power, 2600.0);
    /// assert!(records[0].cutoff);
    /// ```
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        match value {
            serde_json::Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let record =
                        serde_json::from_value(item).map_err(|e| FrameError::BadRecord {
                            index,
                            message: e.to_string(),
                        })?;
                    records.push(record);
                }
                Ok(InboundFrame::Telemetry(records))
            }
            serde_json::Value::Object(map) if map.contains_key("status") => {
                let notice = serde_json::from_value(serde_json::Value::Object(map))?;
                Ok(InboundFrame::Notice(notice))
            }
            other => Err(FrameError::UnrecognizedShape(shape_of(&other).to_string())),
        }
    }
}

/// Short description of a JSON value's shape, for protocol warnings.
fn shape_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object without status field",
    }
}

/// Outbound control command, tagged by `action` on the wire.
///
/// The verb names (`update`, `reconnect`, `add`, `remove`) are the
/// controller's protocol, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Command {
    /// Adopt a new cutoff threshold for a room.
    Update {
        /// Target room.
        room_id: String,
        /// New threshold in watts.
        threshold: f64,
    },
    /// Clear cutoff/bypass state for a room and re-evaluate.
    Reconnect {
        /// Target room.
        room_id: String,
    },
    /// Provision a new monitoring channel.
    Add {
        /// Identifier for the new room.
        room_id: String,
        /// Display label.
        name: String,
        /// Initial cutoff threshold in watts.
        threshold: f64,
        /// Measurement relay GPIO pin.
        meas_pin: u8,
        /// Cutoff relay GPIO pin.
        cutoff_pin: u8,
    },
    /// Stop monitoring a channel.
    Remove {
        /// Target room.
        room_id: String,
    },
}

impl Command {
    /// The room this command targets.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Command::Update { room_id, .. }
            | Command::Reconnect { room_id }
            | Command::Add { room_id, .. }
            | Command::Remove { room_id } => room_id,
        }
    }

    /// The wire verb, as serialized into the `action` field.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Update { .. } => "update",
            Command::Reconnect { .. } => "reconnect",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
        }
    }

    /// Serialize to the wire representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
