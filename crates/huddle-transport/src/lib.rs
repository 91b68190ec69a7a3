//! Transport layer for Huddle: how browsers reach the signaling gateway.
//!
//! A [`Transport`] hands out [`Handshake`]s as soon as a peer opens a
//! socket; completing the handshake yields a [`Connection`]. Each
//! connection carries whole signaling frames and remembers where its
//! upgrade request came from ([`ConnectionInfo`]), since the request path
//! doubles as a room route.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket listener via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketHandshake, WebSocketTransport,
};

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle for one transport connection.
///
/// The gateway owns the connections; the registry and the room layer only
/// ever hold this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next unused id. Ids start at 1 and are never reused.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What is known about a connection once it has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Path of the upgrade request, e.g. `/demo`. Always starts with `/`.
    pub path: String,
}

/// Listens for browsers and turns them into [`Connection`]s.
pub trait Transport: Send + 'static {
    type Connection: Connection;
    type Handshake: Handshake<Connection = Self::Connection>;

    /// Waits for the next peer to open a socket.
    ///
    /// Returns before the upgrade runs. Callers complete the handshake off
    /// the accept loop, so a peer that never speaks cannot hold up the next
    /// one.
    async fn accept(&mut self) -> Result<Self::Handshake, TransportError>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A peer that has connected but not yet finished its upgrade.
pub trait Handshake: Send + 'static {
    type Connection: Connection;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the upgrade. A failure only affects this one peer.
    async fn complete(self) -> Result<Self::Connection, TransportError>;
}

/// One browser's signaling channel.
///
/// `send` and `recv` may run concurrently: a handler parked in `recv`
/// must not hold up outbound notifications.
pub trait Connection: Send + Sync + 'static {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    fn info(&self) -> &ConnectionInfo;

    fn id(&self) -> ConnectionId {
        self.info().id
    }

    fn path(&self) -> &str {
        &self.info().path
    }
}
