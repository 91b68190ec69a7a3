//! # Huddle
//!
//! Signaling gateway for browser video rooms.
//!
//! Browsers connect over WebSocket, say which room they want, and tell the
//! gateway once their camera stream is live. The gateway then introduces
//! them to everyone already in the room (`user-connected`) and hands them
//! the current member list (`room-joined`); the browsers negotiate the
//! actual peer-to-peer media themselves. When someone leaves, the rest of
//! the room hears `user-disconnected` only after the departure is recorded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huddle::prelude::*;
//!
//! # async fn start() -> Result<(), HuddleError> {
//! let server = HuddleServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod config;
mod connections;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_IDLE_TIMEOUT_SECS};
pub use connections::ConnectionTable;
pub use error::HuddleError;
pub use server::{HuddleServer, HuddleServerBuilder};

/// Everything needed to embed the gateway.
pub mod prelude {
    pub use crate::{ConfigError, HuddleError, HuddleServer, HuddleServerBuilder, ServerConfig};
    pub use huddle_protocol::{ClientMessage, ParticipantId, RoomId, ServerMessage};
}
