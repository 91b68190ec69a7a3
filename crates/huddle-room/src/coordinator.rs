//! The coordinator: sole owner of the registry and the room directory.
//!
//! Every membership change happens here, inside one `&mut self` call, and
//! produces the list of notifications it implies. Nothing in this module
//! delivers anything: the [`EventSequencer`](crate::EventSequencer) hands
//! the notifications out after the lock around the coordinator is released.

use huddle_protocol::{ParticipantId, RoomId, ServerMessage};
use huddle_registry::{Participant, ParticipantRegistry, RegistryError};
use huddle_transport::ConnectionId;

use crate::{RoomDirectory, RoomError};

/// A message addressed to one participant's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: ParticipantId,
    pub connection: ConnectionId,
    pub message: ServerMessage,
}

/// A committed join: the snapshot plus what to tell whom.
#[derive(Debug)]
pub(crate) struct JoinCommit {
    pub(crate) room_id: RoomId,
    pub(crate) prior_members: Vec<ParticipantId>,
    pub(crate) notifications: Vec<Notification>,
}

/// A committed departure.
#[derive(Debug)]
pub(crate) struct Departure {
    pub(crate) room_id: Option<RoomId>,
    pub(crate) remaining: Vec<ParticipantId>,
    pub(crate) notifications: Vec<Notification>,
}

/// Owns the participant registry and the room directory together, so a
/// participant's registry record and its room membership never disagree.
#[derive(Debug, Default)]
pub struct Coordinator {
    registry: ParticipantRegistry,
    directory: RoomDirectory,
}

impl Coordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `participant` on `connection` in the Connecting state.
    ///
    /// If that takes the id over from another connection still waiting
    /// for its stream, the returned notification tells the old connection
    /// it lost the id.
    pub fn register(
        &mut self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<Option<Notification>, RoomError> {
        let superseded = self
            .registry
            .lookup(&participant)
            .map(|previous| previous.connection)
            .filter(|previous| *previous != connection);
        self.registry.register(participant.clone(), connection)?;

        Ok(superseded.map(|previous| Notification {
            message: ServerMessage::Error {
                code: 409,
                message: format!("{participant} was taken over by {connection}"),
            },
            recipient: participant,
            connection: previous,
        }))
    }

    /// Commits a join whose media stream is ready.
    ///
    /// Marks the participant Active, adds it to the room, and records the
    /// association, all before any notification exists. The snapshot of
    /// prior members is taken in the same step as the insertion.
    ///
    /// Notifications, in order: `room-joined` to the joiner, then
    /// `user-connected` to each prior member.
    pub(crate) fn commit_join(
        &mut self,
        room_id: RoomId,
        participant: &ParticipantId,
        connection: ConnectionId,
    ) -> Result<JoinCommit, RoomError> {
        let record = self.owned_record(participant, connection).ok_or_else(
            || RegistryError::UnknownParticipant(participant.clone()),
        )?;
        if let Some(current) = &record.room {
            return Err(RoomError::AlreadyInRoom(
                participant.clone(),
                current.clone(),
            ));
        }

        self.registry.mark_active(participant)?;
        let prior_members =
            self.directory.join(room_id.clone(), participant.clone());
        self.registry.assign_room(participant, room_id.clone())?;

        let mut notifications = Vec::with_capacity(prior_members.len() + 1);
        notifications.push(Notification {
            recipient: participant.clone(),
            connection,
            message: ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                participant_id: participant.clone(),
                members: prior_members.clone(),
            },
        });
        notifications.extend(self.notify_members(
            &prior_members,
            &ServerMessage::UserConnected {
                participant_id: participant.clone(),
            },
        ));

        Ok(JoinCommit {
            room_id,
            prior_members,
            notifications,
        })
    }

    /// Removes a participant from the registry and from its room in one
    /// step. Returns `None` if there is nothing to remove, including when
    /// the id now belongs to a different connection.
    ///
    /// With `acknowledge`, the leaver gets `room-left` before the remaining
    /// members get `user-disconnected`.
    pub(crate) fn depart(
        &mut self,
        participant: &ParticipantId,
        connection: ConnectionId,
        acknowledge: bool,
    ) -> Option<Departure> {
        if self.owned_record(participant, connection).is_none() {
            tracing::debug!(
                participant_id = %participant,
                conn_id = %connection,
                "ignoring departure for unknown or superseded participant"
            );
            return None;
        }

        let room_id = self.registry.unregister(participant);
        let remaining = match &room_id {
            Some(room) => self.directory.leave(room, participant),
            None => Vec::new(),
        };

        let mut notifications = Vec::with_capacity(remaining.len() + 1);
        if let (true, Some(room)) = (acknowledge, &room_id) {
            notifications.push(Notification {
                recipient: participant.clone(),
                connection,
                message: ServerMessage::RoomLeft {
                    room_id: room.clone(),
                },
            });
        }
        notifications.extend(self.notify_members(
            &remaining,
            &ServerMessage::UserDisconnected {
                participant_id: participant.clone(),
            },
        ));

        Some(Departure {
            room_id,
            remaining,
            notifications,
        })
    }

    /// Returns the members of a room in join order.
    pub fn members_of(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.directory.members_of(room_id)
    }

    /// Looks up a participant's registry record.
    pub fn lookup(&self, participant: &ParticipantId) -> Option<&Participant> {
        self.registry.lookup(participant)
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.directory.room_count()
    }

    /// Returns the number of registered participants.
    pub fn participant_count(&self) -> usize {
        self.registry.len()
    }

    /// The participant's record, if it is registered on `connection`.
    fn owned_record(
        &self,
        participant: &ParticipantId,
        connection: ConnectionId,
    ) -> Option<&Participant> {
        self.registry
            .lookup(participant)
            .filter(|record| record.connection == connection)
    }

    /// Resolves each member to its connection and addresses `message`.
    fn notify_members(
        &self,
        members: &[ParticipantId],
        message: &ServerMessage,
    ) -> Vec<Notification> {
        members
            .iter()
            .filter_map(|member| match self.registry.lookup(member) {
                Some(record) => Some(Notification {
                    recipient: member.clone(),
                    connection: record.connection,
                    message: message.clone(),
                }),
                None => {
                    tracing::warn!(
                        participant_id = %member,
                        "room member has no registry record"
                    );
                    None
                }
            })
            .collect()
    }
}
