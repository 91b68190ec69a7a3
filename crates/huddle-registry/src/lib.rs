//! Participant registry for Huddle.
//!
//! This crate owns the per-connection identity of everyone talking to the
//! signaling gateway:
//!
//! 1. **Identity**: which participant id belongs to which connection
//! 2. **Liveness**: CONNECTING until the media stream is ready, then
//!    ACTIVE, DISCONNECTED on the way out
//! 3. **Room association**: the one room a participant is in, if any
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← references participants by id only
//!     ↕
//! Registry (this crate)  ← owns Participant records
//!     ↕
//! Protocol / Transport (below)  ← ParticipantId, RoomId, ConnectionId
//! ```

mod error;
mod participant;
mod registry;

pub use error::RegistryError;
pub use participant::{Liveness, Participant};
pub use registry::ParticipantRegistry;
