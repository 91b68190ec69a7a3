//! Unified error type for Huddle.

use huddle_protocol::ProtocolError;
use huddle_registry::RegistryError;
use huddle_room::{DeliveryError, RoomError};
use huddle_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (duplicate or unknown participant).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A room-level error (already in a room, or a wrapped registry error).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A notification could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HuddleError {
    /// The `error` frame code a client sees for this error.
    ///
    /// 409 for identity conflicts, 404 for unknown participants, 400 for
    /// anything the client sent that could not be used.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Registry(e) | Self::Room(RoomError::Registry(e)) => match e {
                RegistryError::DuplicateIdentifier(_) => 409,
                RegistryError::UnknownParticipant(_) => 404,
            },
            Self::Room(RoomError::AlreadyInRoom(..)) => 409,
            _ => 400,
        }
    }
}
