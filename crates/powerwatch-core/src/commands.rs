//! Validated command path to the cutoff controller.
//!
//! The gateway is a thin layer over the stream client's single outbound
//! path. It validates before anything touches the wire, applies the local
//! optimistic effect once a command is accepted onto the send path, and adds
//! no queuing or retry of its own: a failed send means a dropped command,
//! reported synchronously.

use std::sync::Arc;

use tracing::debug;

use powerwatch_types::{Command, Room, ThresholdRange};

use crate::error::{Error, Result};
use crate::registry::RoomPatch;
use crate::state::SharedState;

/// Parameters for provisioning a new monitored room.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoom {
    /// Identifier for the new room; must be unused.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Initial cutoff threshold in watts.
    pub threshold: f64,
    /// Measurement relay GPIO pin.
    pub measurement_pin: u8,
    /// Cutoff relay GPIO pin.
    pub cutoff_pin: u8,
}

/// Validated verbs over the stream client's outbound path.
#[derive(Clone)]
pub struct CommandGateway {
    state: Arc<SharedState>,
    thresholds: ThresholdRange,
}

impl CommandGateway {
    pub(crate) fn new(state: Arc<SharedState>, thresholds: ThresholdRange) -> Self {
        Self { state, thresholds }
    }

    /// Ask the device to adopt a new cutoff threshold for a room.
    ///
    /// The registry is updated as soon as the command is accepted onto the
    /// send path; the device confirms through subsequent telemetry.
    pub fn update_threshold(&self, room_id: &str, threshold: f64) -> Result<()> {
        self.check_threshold(threshold)?;
        self.check_room_exists(room_id)?;

        self.state.send_command(Command::Update {
            room_id: room_id.to_string(),
            threshold,
        })?;
        self.state
            .registry_write()
            .merge(room_id, &RoomPatch::new().threshold(threshold));
        debug!(room = room_id, threshold, "threshold update submitted");
        Ok(())
    }

    /// Ask the device to clear cutoff/bypass state for a room and
    /// re-evaluate.
    ///
    /// No local effect: the next status frame reports the outcome.
    pub fn reset(&self, room_id: &str) -> Result<()> {
        self.check_room_exists(room_id)?;
        self.state.send_command(Command::Reconnect {
            room_id: room_id.to_string(),
        })?;
        debug!(room = room_id, "reset submitted");
        Ok(())
    }

    /// Provision a new monitoring channel on the device and register the
    /// room locally.
    pub fn add_room(&self, new_room: NewRoom) -> Result<()> {
        if new_room.id.is_empty() {
            return Err(Error::invalid_command("room id must not be empty"));
        }
        if new_room.name.is_empty() {
            return Err(Error::invalid_command("room name must not be empty"));
        }
        self.check_threshold(new_room.threshold)?;
        if self.state.registry_read().contains(&new_room.id) {
            return Err(Error::DuplicateRoom(new_room.id));
        }

        self.state.send_command(Command::Add {
            room_id: new_room.id.clone(),
            name: new_room.name.clone(),
            threshold: new_room.threshold,
            meas_pin: new_room.measurement_pin,
            cutoff_pin: new_room.cutoff_pin,
        })?;

        let room = Room::new(new_room.id, new_room.name, new_room.threshold)
            .with_pins(new_room.measurement_pin, new_room.cutoff_pin);
        debug!(room = %room.id, "room provisioning submitted");
        self.state.registry_write().insert(room);
        Ok(())
    }

    /// Delete a room locally and fire a best-effort remove command at the
    /// device.
    ///
    /// The local removal (registry entry and sample series) happens even if
    /// the link is down; a send failure is still reported so the caller can
    /// warn that the device keeps monitoring the channel until it
    /// reconnects.
    pub fn remove_room(&self, room_id: &str) -> Result<()> {
        self.check_room_exists(room_id)?;

        self.state.registry_write().remove(room_id);
        self.state.window_write().remove(room_id);
        debug!(room = room_id, "room removed");

        self.state.send_command(Command::Remove {
            room_id: room_id.to_string(),
        })
    }

    fn check_threshold(&self, value: f64) -> Result<()> {
        if self.thresholds.contains(value) {
            Ok(())
        } else {
            Err(Error::threshold_out_of_range(value, self.thresholds))
        }
    }

    fn check_room_exists(&self, room_id: &str) -> Result<()> {
        if self.state.registry_read().contains(room_id) {
            Ok(())
        } else {
            Err(Error::RoomNotFound(room_id.to_string()))
        }
    }
}
