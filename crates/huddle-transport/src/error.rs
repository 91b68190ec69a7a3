use std::io;
use std::net::SocketAddr;

use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept TCP connection: {0}")]
    Accept(#[source] io::Error),

    /// The peer connected but never completed a WebSocket upgrade, e.g. a
    /// plain HTTP request or a handshake that timed out.
    #[error("upgrade from {peer} failed: {reason}")]
    Upgrade { peer: SocketAddr, reason: String },

    #[error("send on {0} failed: {1}")]
    Send(ConnectionId, String),

    #[error("receive on {0} failed: {1}")]
    Receive(ConnectionId, String),

    #[error("close on {0} failed: {1}")]
    Close(ConnectionId, String),
}
