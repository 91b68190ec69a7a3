//! Error types for the room layer.

use huddle_protocol::{ParticipantId, RoomId};
use huddle_registry::RegistryError;
use huddle_transport::ConnectionId;

/// Errors that can occur while changing room membership.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The registry rejected the operation (duplicate or unknown id).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The participant is already a member of a room. Leave it first.
    #[error("participant {0} already in room {1}")]
    AlreadyInRoom(ParticipantId, RoomId),
}

/// A single notification could not be handed to its connection.
///
/// Never rolls back the membership change that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's mailbox is closed or was never registered.
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),
}
