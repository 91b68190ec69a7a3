//! Wire protocol for Huddle.
//!
//! This crate defines what browsers and the signaling gateway say to each
//! other:
//!
//! - **Identifiers** ([`ParticipantId`], [`RoomId`]): opaque strings.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the closed set
//!   of signaling events (join, stream-ready, leave, and their
//!   notifications).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ messages.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Registry / Room (membership)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, MAX_FRAME_LEN};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, ParticipantId, RoomId, ServerMessage};
