//! The participant registry: every participant the gateway knows about.
//!
//! # Concurrency note
//!
//! `ParticipantRegistry` is a plain `HashMap` wrapper with `&mut self`
//! mutators. It is owned, together with the room directory, by a single
//! coordinator behind one lock, so registry and room membership always
//! change in the same critical section.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use huddle_protocol::{ParticipantId, RoomId};
use huddle_transport::ConnectionId;

use crate::{Liveness, Participant, RegistryError};

/// Tracks all registered participants, keyed by id.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ mark_active() ──→ assign_room() ──→ unregister()
///     │                                                   │
///     ▼                                                   ▼
/// [Connecting]          [Active]                    (record removed,
///                                                    room returned)
/// ```
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a participant in the Connecting state.
    ///
    /// A Connecting record under the same id is replaced, whether or not
    /// its connection is still open. Telling the old connection is up to
    /// the caller.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateIdentifier`] if the id belongs to
    /// an Active participant.
    pub fn register(
        &mut self,
        id: ParticipantId,
        connection: ConnectionId,
    ) -> Result<&Participant, RegistryError> {
        let record = Participant {
            id: id.clone(),
            room: None,
            connection,
            liveness: Liveness::Connecting,
        };

        let participant = match self.participants.entry(id) {
            Entry::Occupied(mut existing) => {
                if existing.get().liveness == Liveness::Active {
                    return Err(RegistryError::DuplicateIdentifier(
                        existing.key().clone(),
                    ));
                }
                tracing::debug!(
                    participant_id = %existing.key(),
                    previous = %existing.get().connection,
                    "replacing connecting participant"
                );
                existing.insert(record);
                existing.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(record),
        };

        tracing::info!(
            participant_id = %participant.id,
            conn_id = %connection,
            "participant registered"
        );
        Ok(participant)
    }

    /// Marks a participant Active. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns [`RegistryError::UnknownParticipant`] if the id is not
    /// registered.
    pub fn mark_active(
        &mut self,
        id: &ParticipantId,
    ) -> Result<(), RegistryError> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownParticipant(id.clone()))?;

        if participant.liveness != Liveness::Active {
            participant.liveness = Liveness::Active;
            tracing::debug!(participant_id = %id, "participant active");
        }
        Ok(())
    }

    /// Records the room a participant has joined.
    ///
    /// # Errors
    /// Returns [`RegistryError::UnknownParticipant`] if the id is not
    /// registered.
    pub fn assign_room(
        &mut self,
        id: &ParticipantId,
        room: RoomId,
    ) -> Result<(), RegistryError> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownParticipant(id.clone()))?;
        participant.room = Some(room);
        Ok(())
    }

    /// Removes a participant and returns the room it was in, if any.
    ///
    /// Unknown ids are ignored: a disconnect may arrive twice, or before
    /// the participant ever registered.
    pub fn unregister(&mut self, id: &ParticipantId) -> Option<RoomId> {
        let mut participant = self.participants.remove(id)?;
        participant.liveness = Liveness::Disconnected;

        tracing::info!(
            participant_id = %participant.id,
            conn_id = %participant.connection,
            liveness = %participant.liveness,
            room_id = participant.room.as_ref().map(RoomId::as_str),
            "participant unregistered"
        );
        participant.room
    }

    /// Looks up a participant by id.
    pub fn lookup(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Returns the number of registered participants (any liveness).
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
