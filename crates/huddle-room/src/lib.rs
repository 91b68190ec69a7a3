//! Room membership and event ordering for Huddle.
//!
//! A participant appears in a room only once its media stream is ready,
//! and every join or leave is committed before anyone hears about it.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: which participants are in which room
//! - [`Coordinator`]: owns the registry and the directory together
//! - [`EventSequencer`]: serializes changes, then fans notifications out
//! - [`Outbox`]: where notifications are delivered (the gateway's
//!   connection table)

mod coordinator;
mod directory;
mod error;
mod sequencer;

pub use coordinator::{Coordinator, Notification};
pub use directory::RoomDirectory;
pub use error::{DeliveryError, RoomError};
pub use sequencer::{
    DeliveryFailure, DeliveryReport, EventSequencer, JoinOutcome, LeaveOutcome,
    Outbox,
};
