//! Frame codecs.
//!
//! The gateway only sees bytes from the transport and [`ClientMessage`] /
//! [`ServerMessage`] values above it; a [`Codec`] sits in between.
//!
//! [`ClientMessage`]: crate::ClientMessage
//! [`ServerMessage`]: crate::ServerMessage

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Largest inbound frame a codec will try to decode (64 KiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Turns signaling messages into frames and back.
///
/// One instance is shared by every connection task.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// `ProtocolError::Encode` if the value cannot be serialized.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// `ProtocolError::FrameTooLarge` for frames over [`MAX_FRAME_LEN`],
    /// `ProtocolError::Decode` for anything that is not a valid message.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// JSON text frames, the format browser clients speak.
///
/// ```rust
/// use huddle_protocol::{Codec, JsonCodec, ParticipantId, ServerMessage};
///
/// let frame = JsonCodec
///     .encode(&ServerMessage::UserConnected {
///         participant_id: ParticipantId::from("bob"),
///     })
///     .unwrap();
/// assert_eq!(
///     frame,
///     br#"{"type":"user-connected","participant_id":"bob"}"#
/// );
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &[u8],
    ) -> Result<T, ProtocolError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.len(),
                limit: MAX_FRAME_LEN,
            });
        }
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}
