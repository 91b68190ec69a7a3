//! `HuddleServer` builder and server loop.
//!
//! This is the entry point for running a signaling gateway. It ties
//! together all the layers: transport → protocol → registry → room.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use huddle_protocol::{Codec, JsonCodec, MAX_FRAME_LEN};
use huddle_room::EventSequencer;
use huddle_transport::{Handshake, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ConnectionTable, HuddleError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. All
/// membership state lives behind the sequencer's single lock.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sequencer: EventSequencer<ConnectionTable>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Huddle server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use huddle::prelude::*;
///
/// # async fn start() -> Result<(), HuddleError> {
/// let server = HuddleServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HuddleServerBuilder {
    config: ServerConfig,
}

impl HuddleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting with `config`, e.g. one loaded by
    /// [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a connection may stay silent before it is dropped.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<HuddleServer<JsonCodec>, HuddleError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .max_message_len(MAX_FRAME_LEN);

        let state = Arc::new(ServerState {
            sequencer: EventSequencer::new(ConnectionTable::new()),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(HuddleServer { transport, state })
    }
}

/// A bound signaling gateway.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections. Room state lives only as long as the server.
pub struct HuddleServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl HuddleServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> HuddleServerBuilder {
        HuddleServerBuilder::new()
    }
}

impl<C: Codec> HuddleServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), HuddleError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted socket gets its own task, which runs the WebSocket
    /// upgrade and then the connection handler. The loop itself only ever
    /// waits on TCP accept.
    pub async fn run_until(
        mut self,
        shutdown: impl Future,
    ) -> Result<(), HuddleError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            idle_timeout_secs = self.state.config.idle_timeout.as_secs(),
            "Huddle server running"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(handshake) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let peer = handshake.peer_addr();
                            let conn = match handshake.complete().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        let rooms = self.state.sequencer.room_count().await;
        let participants = self.state.sequencer.participant_count().await;
        tracing::info!(rooms, participants, "Huddle server stopped");
        Ok(())
    }
}
