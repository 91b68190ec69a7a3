//! Error types for the participant registry.

use huddle_protocol::ParticipantId;

/// Errors that can occur while registering or updating participants.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Another live connection already holds this participant id.
    /// The existing record is kept; the newcomer is rejected.
    #[error("participant {0} is already registered and active")]
    DuplicateIdentifier(ParticipantId),

    /// The registry has never seen this participant (or already removed
    /// it). Disconnects race with registration, so callers usually treat
    /// this as a no-op.
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
}
