//! Per-connection handler: join handshake, readiness, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Open a mailbox in the connection table
//!   2. `join-room` → register the participant (CONNECTING)
//!   3. `stream-ready` (or `stream_ready: true`) → commit the join
//!   4. Loop: forward mailbox events out, route client messages in
//!   5. On exit (close, error, idle, `disconnect`) → guard cleans up

use std::sync::Arc;

use huddle_protocol::{ClientMessage, Codec, ParticipantId, RoomId, ServerMessage};
use huddle_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::time::Instant;

use crate::HuddleError;
use crate::server::ServerState;

/// Drop guard that disconnects the participant and closes the mailbox
/// when the handler exits.
///
/// Runs even if the handler panics. Since `Drop` is synchronous, the
/// disconnect is a fire-and-forget task; the mailbox is closed inline.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    participant: Option<ParticipantId>,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        self.state.sequencer.outbox().close(conn_id);

        if let Some(participant) = self.participant.take() {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                state.sequencer.disconnect(&participant, conn_id).await;
            });
        }
    }
}

/// Where this connection is in the join handshake.
#[derive(Debug, Default)]
struct Session {
    /// Room named by the accepted `join-room`, kept until leave.
    room: Option<RoomId>,
    /// The join committed; `stream-ready` is no longer expected.
    joined: bool,
}

/// Whether the message loop keeps going.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), HuddleError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.path(), "handling new connection");

    let mut outbound = state.sequencer.outbox().open(conn_id);
    let mut guard = ConnectionGuard {
        conn_id,
        participant: None,
        state: Arc::clone(&state),
    };
    let mut session = Session::default();

    let start = Instant::now();
    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            Some(message) = outbound.recv() => {
                send_message(&conn, &state.codec, &message).await?;
            }

            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);

                let message: ClientMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(
                            %conn_id, error = %e, "failed to decode message"
                        );
                        send_error(
                            &conn,
                            &state.codec,
                            400,
                            &format!("malformed message: {e}"),
                        )
                        .await?;
                        continue;
                    }
                };

                let flow = handle_client_message(
                    &conn, &state, &mut guard, &mut session, message, start,
                )
                .await?;
                if flow == Flow::Close {
                    break;
                }
            }

            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        }
    }

    // guard drops here → disconnect fires, mailbox closes.
    Ok(())
}

/// Routes one client message. Client mistakes are answered with an
/// `error` frame; only transport failures end the connection.
async fn handle_client_message<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    guard: &mut ConnectionGuard<C>,
    session: &mut Session,
    msg: ClientMessage,
    start: Instant,
) -> Result<Flow, HuddleError> {
    let conn_id = conn.id();

    match msg {
        ClientMessage::JoinRoom {
            room_id,
            participant_id,
            stream_ready,
        } => {
            if let Some(current) = &guard.participant {
                send_error(
                    conn,
                    &state.codec,
                    409,
                    &format!("{current} already joined on this connection"),
                )
                .await?;
                return Ok(Flow::Continue);
            }

            let room_id = room_id
                .or_else(|| RoomId::from_path(conn.path()))
                .unwrap_or_else(RoomId::generate);
            let participant =
                participant_id.unwrap_or_else(ParticipantId::generate);

            if let Err(e) = state
                .sequencer
                .register(participant.clone(), conn_id)
                .await
            {
                send_failure(conn, &state.codec, e.into()).await?;
                return Ok(Flow::Continue);
            }
            guard.participant = Some(participant.clone());
            session.room = Some(room_id.clone());

            if stream_ready {
                commit_join(conn, state, session, room_id, &participant)
                    .await?;
            } else {
                send_message(
                    conn,
                    &state.codec,
                    &ServerMessage::Registered {
                        participant_id: participant,
                        room_id,
                    },
                )
                .await?;
            }
        }

        ClientMessage::StreamReady => {
            match (&guard.participant, &session.room) {
                (Some(participant), Some(room_id)) if !session.joined => {
                    let participant = participant.clone();
                    let room_id = room_id.clone();
                    commit_join(conn, state, session, room_id, &participant)
                        .await?;
                }
                _ => {
                    send_error(
                        conn,
                        &state.codec,
                        400,
                        "stream-ready without a pending join-room",
                    )
                    .await?;
                }
            }
        }

        ClientMessage::LeaveRoom => {
            let Some(participant) = guard.participant.take() else {
                send_error(conn, &state.codec, 400, "not in a room").await?;
                return Ok(Flow::Continue);
            };
            let room = session.room.take();
            session.joined = false;

            match state.sequencer.leave(&participant, conn_id).await {
                // Left before the join committed: nobody else knew, so
                // the acknowledgement comes straight from here.
                Some(outcome) if outcome.room_id.is_none() => match room {
                    Some(room_id) => {
                        send_message(
                            conn,
                            &state.codec,
                            &ServerMessage::RoomLeft { room_id },
                        )
                        .await?;
                    }
                    None => {
                        send_error(conn, &state.codec, 400, "not in a room").await?;
                    }
                },
                // room-left already went out through the mailbox.
                Some(_) => {}
                None => {
                    send_error(
                        conn,
                        &state.codec,
                        404,
                        &format!("unknown participant {participant}"),
                    )
                    .await?;
                }
            }
        }

        ClientMessage::Heartbeat { client_time } => {
            let ack = ServerMessage::HeartbeatAck {
                client_time,
                server_time: start.elapsed().as_millis() as u64,
            };
            send_message(conn, &state.codec, &ack).await?;
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%conn_id, %reason, "client disconnected");
            return Ok(Flow::Close);
        }
    }

    Ok(Flow::Continue)
}

/// Commits a readiness-gated join. The `room-joined` reply and every
/// `user-connected` arrive through the mailboxes.
async fn commit_join<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
    session: &mut Session,
    room_id: RoomId,
    participant: &ParticipantId,
) -> Result<(), HuddleError> {
    match state.sequencer.join(room_id, participant, conn.id()).await {
        Ok(outcome) => {
            session.joined = true;
            if !outcome.report.is_complete() {
                tracing::debug!(
                    participant_id = %participant,
                    failed = outcome.report.failures.len(),
                    "join committed with partial fan-out"
                );
            }
            Ok(())
        }
        Err(e) => send_failure(conn, &state.codec, e.into()).await,
    }
}

/// Encodes and sends one message to the client.
async fn send_message(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    message: &ServerMessage,
) -> Result<(), HuddleError> {
    let bytes = codec.encode(message)?;
    conn.send(&bytes).await.map_err(HuddleError::Transport)?;
    Ok(())
}

/// Sends a `ServerMessage::Error` frame to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), HuddleError> {
    let error = ServerMessage::Error {
        code,
        message: message.to_string(),
    };
    send_message(conn, codec, &error).await
}

/// Reports a rejected operation with the matching status code.
async fn send_failure(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    error: HuddleError,
) -> Result<(), HuddleError> {
    tracing::debug!(conn_id = %conn.id(), error = %error, "request rejected");
    send_error(conn, codec, error.status_code(), &error.to_string()).await
}
