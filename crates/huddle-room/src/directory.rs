//! Room directory: which participants are in which room.

use std::collections::HashMap;

use huddle_protocol::{ParticipantId, RoomId};

/// Maps room ids to their members, in join order.
///
/// Rooms are created by the first `join` and removed by the `leave` that
/// empties them, so an absent room and an empty room are indistinguishable.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Vec<ParticipantId>>,
}

impl RoomDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant` to `room_id` and returns the members that were
    /// already there, in join order.
    ///
    /// The returned snapshot never contains the joiner. Joining a room the
    /// participant is already in leaves the member list unchanged.
    pub fn join(
        &mut self,
        room_id: RoomId,
        participant: ParticipantId,
    ) -> Vec<ParticipantId> {
        let members = self.rooms.entry(room_id).or_insert_with_key(|id| {
            tracing::info!(room_id = %id, "room created");
            Vec::new()
        });

        let prior: Vec<ParticipantId> = members
            .iter()
            .filter(|member| **member != participant)
            .cloned()
            .collect();

        if prior.len() == members.len() {
            members.push(participant);
        }
        prior
    }

    /// Removes `participant` from `room_id` and returns who is left.
    ///
    /// Removes the room once it is empty. Unknown rooms and non-members
    /// are ignored.
    pub fn leave(
        &mut self,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Vec<ParticipantId> {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return Vec::new();
        };
        members.retain(|member| member != participant);

        if members.is_empty() {
            self.rooms.remove(room_id);
            tracing::info!(%room_id, "room removed");
            return Vec::new();
        }
        members.clone()
    }

    /// Returns the members of a room in join order (empty if unknown).
    pub fn members_of(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    /// Returns `true` if the room currently exists.
    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Returns the number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
