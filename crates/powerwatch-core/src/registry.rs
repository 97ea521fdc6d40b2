//! In-memory registry of monitored rooms.
//!
//! The registry is a leaf data structure: it knows nothing about the wire or
//! about locking. The stream client is its single writer; concurrency
//! discipline lives in [`state`](crate::state), which wraps the registry in a
//! coarse read/write lock so readers never observe a partially merged room.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use powerwatch_types::{Room, RoomStatus};

/// A partial update merged into a room.
///
/// Only the fields that are `Some` are applied, so a status-only patch from
/// inbound telemetry never clobbers operator-set `name` or `threshold`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    /// New display label.
    pub name: Option<String>,
    /// New cutoff threshold in watts.
    pub threshold: Option<f64>,
    /// New device-reported cutoff state.
    pub cutoff_active: Option<bool>,
    /// New device-reported bypass flag.
    pub bypass_detected: Option<bool>,
    /// New measurement channel.
    pub measurement_pin: Option<u8>,
    /// New cutoff channel.
    pub cutoff_pin: Option<u8>,
}

impl RoomPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display label.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the threshold.
    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set both status flags.
    #[must_use]
    pub fn status(mut self, cutoff_active: bool, bypass_detected: bool) -> Self {
        self.cutoff_active = Some(cutoff_active);
        self.bypass_detected = Some(bypass_detected);
        self
    }

    /// The status-only patch carried by an inbound telemetry record.
    pub fn from_status(status: &RoomStatus) -> Self {
        Self::new().status(status.cutoff, status.bypass)
    }

    fn apply(&self, room: &mut Room) {
        if let Some(name) = &self.name {
            room.name = name.clone();
        }
        if let Some(threshold) = self.threshold {
            room.threshold = threshold;
        }
        if let Some(cutoff_active) = self.cutoff_active {
            room.cutoff_active = cutoff_active;
        }
        if let Some(bypass_detected) = self.bypass_detected {
            room.bypass_detected = bypass_detected;
        }
        if let Some(pin) = self.measurement_pin {
            room.measurement_pin = Some(pin);
        }
        if let Some(pin) = self.cutoff_pin {
            room.cutoff_pin = Some(pin);
        }
    }
}

/// Insertion-ordered map of room id to [`Room`].
///
/// Listing preserves the order rooms were first registered in, so the UI
/// layout stays stable as telemetry churns.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    order: Vec<String>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Whether a room with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    /// Look up a room by id.
    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Register a new room. Returns `false` (and leaves the registry
    /// untouched) if the id is already taken.
    pub fn insert(&mut self, room: Room) -> bool {
        if self.rooms.contains_key(&room.id) {
            return false;
        }
        self.order.push(room.id.clone());
        self.rooms.insert(room.id.clone(), room);
        true
    }

    /// Merge a patch into the room with this id, creating the room with
    /// default settings (see [`Room::named`]) if it does not exist yet.
    ///
    /// Returns a reference to the room after the merge.
    pub fn upsert(&mut self, id: &str, patch: &RoomPatch) -> &Room {
        let room = match self.rooms.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(id.to_string());
                entry.insert(Room::named(id))
            }
        };
        patch.apply(room);
        room
    }

    /// Merge a patch into an existing room. Returns `false` if the id is
    /// unknown; the registry is untouched in that case.
    pub fn merge(&mut self, id: &str, patch: &RoomPatch) -> bool {
        match self.rooms.get_mut(id) {
            Some(room) => {
                patch.apply(room);
                true
            }
            None => false,
        }
    }

    /// Remove a room, returning it if it existed.
    pub fn remove(&mut self, id: &str) -> Option<Room> {
        let room = self.rooms.remove(id)?;
        self.order.retain(|known| known != id);
        Some(room)
    }

    /// Snapshot of all rooms in insertion order.
    pub fn list(&self) -> Vec<Room> {
        self.order
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .cloned()
            .collect()
    }
}
