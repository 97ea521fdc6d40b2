//! Platform-agnostic types for room power telemetry.
//!
//! This crate defines the data model shared by the powerwatch workspace:
//! monitored rooms, power samples, and the JSON wire frames exchanged with
//! the remote cutoff controller.
//!
//! # Wire Contract
//!
//! The controller speaks text-framed JSON over a duplex connection:
//!
//! | Direction | Shape | Meaning |
//! |-----------|-------|---------|
//! | inbound | array of records | per-room telemetry batch |
//! | inbound | `{"status": ..., "message": ...}` | command acknowledgement / notice |
//! | outbound | `{"action": ..., "room_id": ..., ...}` | control command |
//!
//! Inbound frames are classified with [`InboundFrame::parse`] before any
//! further processing; unrecognized shapes fail closed with a [`FrameError`].

pub mod error;
pub mod types;
pub mod wire;

pub use error::FrameError;
pub use types::{DEFAULT_THRESHOLD_WATTS, Room, Sample, ThresholdRange};
pub use wire::{AckStatus, Command, InboundFrame, Notice, RoomStatus};
