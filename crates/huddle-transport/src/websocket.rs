//! WebSocket listener built on `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::{
    Connection, ConnectionId, ConnectionInfo, Handshake, Transport, TransportError,
};

/// How long a peer gets to finish the WebSocket upgrade once it has
/// opened a socket.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<TcpStream>;

/// Accepts browser WebSocket connections on a TCP listener.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds to `addr`; port 0 picks a free port (see
    /// [`Transport::local_addr`]).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    /// Caps inbound messages at `len` bytes. Larger frames are refused
    /// from their header, before the payload is buffered.
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.config = self
            .config
            .max_message_size(Some(len))
            .max_frame_size(Some(len));
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Handshake = WebSocketHandshake;

    async fn accept(&mut self) -> Result<WebSocketHandshake, TransportError> {
        let (stream, peer_addr) =
            self.listener.accept().await.map_err(TransportError::Accept)?;
        tracing::trace!(peer = %peer_addr, "TCP connection opened");
        Ok(WebSocketHandshake {
            stream,
            peer_addr,
            config: self.config,
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// An accepted socket waiting for its WebSocket upgrade.
pub struct WebSocketHandshake {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: WebSocketConfig,
}

impl Handshake for WebSocketHandshake {
    type Connection = WebSocketConnection;

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Upgrades within [`HANDSHAKE_TIMEOUT`], recording the request path.
    async fn complete(self) -> Result<WebSocketConnection, TransportError> {
        let peer_addr = self.peer_addr;
        let mut path = String::from("/");
        let capture_path =
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                path = req.uri().path().to_string();
                Ok(resp)
            };

        let upgrade = tokio_tungstenite::accept_hdr_async_with_config(
            self.stream,
            capture_path,
            Some(self.config),
        );
        let reason = match tokio::time::timeout(HANDSHAKE_TIMEOUT, upgrade).await {
            Ok(Ok(ws)) => {
                let info = ConnectionInfo {
                    id: ConnectionId::next(),
                    peer_addr,
                    path,
                };
                tracing::debug!(
                    conn_id = %info.id,
                    peer = %info.peer_addr,
                    path = %info.path,
                    "accepted WebSocket connection"
                );

                let (sink, stream) = ws.split();
                return Ok(WebSocketConnection {
                    info,
                    sink: Mutex::new(sink),
                    stream: Mutex::new(stream),
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "handshake timed out".to_string(),
        };
        Err(TransportError::Upgrade {
            peer: peer_addr,
            reason,
        })
    }
}

/// A browser connected over WebSocket.
///
/// The socket is split so the reading half and the writing half have
/// separate locks.
pub struct WebSocketConnection {
    info: ConnectionInfo,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    /// UTF-8 frames (all JSON) go out as text, anything else as binary.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let message = match std::str::from_utf8(frame) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(frame.to_vec()),
        };
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::Send(self.info.id, e.to_string()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Ok(Some(data.to_vec())),
                Ok(Message::Close(_)) => return Ok(None),
                // Pings are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => {
                    return Err(TransportError::Receive(self.info.id, e.to_string()));
                }
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Close(self.info.id, e.to_string()))
    }

    fn info(&self) -> &ConnectionInfo {
        &self.info
    }
}
