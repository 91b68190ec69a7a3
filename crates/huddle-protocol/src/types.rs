//! Signaling message types and the identifiers they carry.
//!
//! Everything here is serialized as JSON objects internally tagged with a
//! kebab-case `"type"` field, e.g.
//! `{ "type": "user-connected", "participant_id": "bob" }`. The event
//! names match what existing browser clients already listen for.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, globally unique identifier of a participant.
///
/// Usually chosen by the browser's negotiation layer (its peer id) so the
/// other members can call it directly; the gateway generates one when the
/// client does not supply it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Generates a fresh random identifier (32 hex characters).
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a room. Any string works; rooms exist implicitly while
/// they have members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Generates a fresh random room identifier, used when a client
    /// connects to the bare root path.
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Maps a request path such as `/demo` to a room.
    ///
    /// Only the first path segment counts. Returns `None` for the bare
    /// root (`/` or empty), which callers answer with [`RoomId::generate`].
    pub fn from_path(path: &str) -> Option<Self> {
        path.split('/')
            .find(|segment| !segment.is_empty())
            .map(|segment| Self(segment.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 16 random bytes rendered as lowercase hex.
fn random_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// ClientMessage: browser → gateway
// ---------------------------------------------------------------------------

/// Messages a browser sends to the signaling gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// "I want to be in this room."
    ///
    /// Registers the participant. The actual join happens once the media
    /// stream is ready: immediately when `stream_ready` is set, otherwise
    /// on a later [`ClientMessage::StreamReady`].
    JoinRoom {
        /// Falls back to the connection's request path, then to a
        /// generated room.
        #[serde(default)]
        room_id: Option<RoomId>,
        /// Falls back to a generated identifier.
        #[serde(default)]
        participant_id: Option<ParticipantId>,
        #[serde(default)]
        stream_ready: bool,
    },

    /// "My local media stream is live; I can answer calls now."
    StreamReady,

    /// "Take me out of my room" (the connection stays open).
    LeaveRoom,

    /// Keep-alive. `client_time` is echoed back for RTT measurement.
    Heartbeat { client_time: u64 },

    /// "I'm going away." Same effect as dropping the socket.
    Disconnect {
        #[serde(default)]
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// ServerMessage: gateway → browser
// ---------------------------------------------------------------------------

/// Messages the signaling gateway sends to a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The participant is registered and the join is waiting for
    /// `stream-ready`.
    Registered {
        participant_id: ParticipantId,
        room_id: RoomId,
    },

    /// The join committed. `members` are the participants that were
    /// already in the room, in join order; they will call the newcomer.
    RoomJoined {
        room_id: RoomId,
        participant_id: ParticipantId,
        members: Vec<ParticipantId>,
    },

    /// Another participant joined the caller's room. The receiver should
    /// initiate a call toward it.
    UserConnected { participant_id: ParticipantId },

    /// Another participant left the caller's room. The receiver should
    /// close its call with it.
    UserDisconnected { participant_id: ParticipantId },

    /// Acknowledges an explicit `leave-room`.
    RoomLeft { room_id: RoomId },

    /// Reply to [`ClientMessage::Heartbeat`]. `server_time` is
    /// milliseconds since the connection was accepted.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Something the client sent was rejected. `code` follows HTTP
    /// conventions (400 bad request, 404 unknown, 409 conflict).
    Error { code: u16, message: String },
}
