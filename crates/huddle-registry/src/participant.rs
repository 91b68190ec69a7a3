//! Participant record and its liveness state machine.

use std::fmt;

use huddle_protocol::{ParticipantId, RoomId};
use huddle_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Where a participant is in its connection lifecycle.
///
/// ```text
///   Connecting ──(stream ready)──→ Active ──(disconnect / leave)──→ Disconnected
///       │                                                              ↑
///       └──────────────────────(disconnect)────────────────────────────┘
/// ```
///
/// - **Connecting**: registered, but its media stream is not ready to
///   answer calls yet, so nobody has been told about it.
/// - **Active**: stream ready; may be a room member.
/// - **Disconnected**: the record is being removed. Only ever observed on
///   the value handed back during removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Connecting,
    Active,
    Disconnected,
}

impl Liveness {
    /// Returns `true` while the participant may belong to a room.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One connected browser session.
#[derive(Debug, Clone)]
pub struct Participant {
    /// The participant's identifier, usually its negotiation-layer peer id.
    pub id: ParticipantId,

    /// The room the participant is currently in. Set only once the join
    /// has been committed to the room directory.
    pub room: Option<RoomId>,

    /// The transport connection that registered this participant. Used to
    /// route notifications and to ignore stale disconnects from a previous
    /// connection that carried the same id.
    pub connection: ConnectionId,

    /// Current lifecycle state.
    pub liveness: Liveness,
}
