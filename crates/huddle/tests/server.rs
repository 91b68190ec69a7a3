//! Integration tests for the Huddle server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle::prelude::*;
use serde_json::json;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(HuddleServer::builder()).await
}

async fn start_server_with(builder: HuddleServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str, path: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("should send");
}

/// Receives the next signaling message, skipping control frames.
async fn recv_msg(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("should receive within timeout")
            .expect("stream should not end")
            .expect("frame should be valid");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str())
                    .expect("server should send valid JSON");
            }
            Message::Binary(_) => panic!("signaling uses text frames"),
            _ => continue,
        }
    }
}

/// Asserts nothing arrives for a short while.
async fn assert_silent(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(result.is_err(), "expected no message, got {result:?}");
}

/// Joins with a ready stream and returns the `members` snapshot.
async fn join_ready(ws: &mut ClientWs, room: &str, id: &str) -> Vec<ParticipantId> {
    send_json(
        ws,
        json!({
            "type": "join-room",
            "room_id": room,
            "participant_id": id,
            "stream_ready": true,
        }),
    )
    .await;
    match recv_msg(ws).await {
        ServerMessage::RoomJoined {
            room_id,
            participant_id,
            members,
        } => {
            assert_eq!(room_id, RoomId::from(room));
            assert_eq!(participant_id, ParticipantId::from(id));
            members
        }
        other => panic!("expected room-joined, got {other:?}"),
    }
}

fn user_connected(id: &str) -> ServerMessage {
    ServerMessage::UserConnected {
        participant_id: ParticipantId::from(id),
    }
}

fn user_disconnected(id: &str) -> ServerMessage {
    ServerMessage::UserDisconnected {
        participant_id: ParticipantId::from(id),
    }
}

fn error_code(msg: &ServerMessage) -> u16 {
    match msg {
        ServerMessage::Error { code, .. } => *code,
        other => panic!("expected error, got {other:?}"),
    }
}

// =========================================================================
// Join / leave flow
// =========================================================================

#[tokio::test]
async fn test_alice_and_bob_meet_in_demo() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;

    assert!(join_ready(&mut alice, "demo", "alice").await.is_empty());

    // bob registers before the camera is live: nobody is told.
    send_json(
        &mut bob,
        json!({ "type": "join-room", "room_id": "demo", "participant_id": "bob" }),
    )
    .await;
    assert_eq!(
        recv_msg(&mut bob).await,
        ServerMessage::Registered {
            participant_id: ParticipantId::from("bob"),
            room_id: RoomId::from("demo"),
        }
    );
    assert_silent(&mut alice).await;

    // Stream ready: bob gets the snapshot, alice gets told to call bob.
    send_json(&mut bob, json!({ "type": "stream-ready" })).await;
    assert_eq!(
        recv_msg(&mut bob).await,
        ServerMessage::RoomJoined {
            room_id: RoomId::from("demo"),
            participant_id: ParticipantId::from("bob"),
            members: vec![ParticipantId::from("alice")],
        }
    );
    assert_eq!(recv_msg(&mut alice).await, user_connected("bob"));

    // bob's socket goes away: alice hears about it.
    bob.close(None).await.expect("close should succeed");
    drop(bob);
    assert_eq!(recv_msg(&mut alice).await, user_disconnected("bob"));

    // alice is alone in demo: a newcomer sees only alice.
    let mut carol = connect(&addr, "/").await;
    assert_eq!(
        join_ready(&mut carol, "demo", "carol").await,
        vec![ParticipantId::from("alice")]
    );
    assert_eq!(recv_msg(&mut alice).await, user_connected("carol"));
}

#[tokio::test]
async fn test_room_comes_from_request_path() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/lobby").await;

    send_json(
        &mut ws,
        json!({ "type": "join-room", "participant_id": "alice", "stream_ready": true }),
    )
    .await;

    match recv_msg(&mut ws).await {
        ServerMessage::RoomJoined { room_id, .. } => {
            assert_eq!(room_id, RoomId::from("lobby"));
        }
        other => panic!("expected room-joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_root_path_generates_room_and_participant() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/").await;

    send_json(&mut ws, json!({ "type": "join-room" })).await;

    match recv_msg(&mut ws).await {
        ServerMessage::Registered {
            participant_id,
            room_id,
        } => {
            assert_eq!(room_id.as_str().len(), 32);
            assert_eq!(participant_id.as_str().len(), 32);
        }
        other => panic!("expected registered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_leave_room_acknowledges_and_notifies() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;
    join_ready(&mut alice, "demo", "alice").await;
    join_ready(&mut bob, "demo", "bob").await;
    assert_eq!(recv_msg(&mut alice).await, user_connected("bob"));

    send_json(&mut bob, json!({ "type": "leave-room" })).await;

    assert_eq!(
        recv_msg(&mut bob).await,
        ServerMessage::RoomLeft {
            room_id: RoomId::from("demo")
        }
    );
    assert_eq!(recv_msg(&mut alice).await, user_disconnected("bob"));

    // The connection stays open and can join again.
    assert_eq!(
        join_ready(&mut bob, "demo", "bob").await,
        vec![ParticipantId::from("alice")]
    );
    assert_eq!(recv_msg(&mut alice).await, user_connected("bob"));
}

#[tokio::test]
async fn test_leave_before_stream_ready_is_acknowledged_quietly() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;
    join_ready(&mut alice, "demo", "alice").await;

    send_json(
        &mut bob,
        json!({ "type": "join-room", "room_id": "demo", "participant_id": "bob" }),
    )
    .await;
    recv_msg(&mut bob).await; // registered
    send_json(&mut bob, json!({ "type": "leave-room" })).await;

    assert_eq!(
        recv_msg(&mut bob).await,
        ServerMessage::RoomLeft {
            room_id: RoomId::from("demo")
        }
    );
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_leave_room_is_always_answered() {
    let addr = start_server().await;
    let mut first = connect(&addr, "/").await;
    let mut second = connect(&addr, "/").await;

    let register = json!({ "type": "join-room", "room_id": "demo", "participant_id": "alice" });
    send_json(&mut first, register.clone()).await;
    recv_msg(&mut first).await; // registered
    send_json(&mut second, register).await;
    recv_msg(&mut second).await; // registered
    assert_eq!(error_code(&recv_msg(&mut first).await), 409);

    // The superseded connection no longer holds alice.
    send_json(&mut first, json!({ "type": "leave-room" })).await;
    assert_eq!(error_code(&recv_msg(&mut first).await), 404);

    send_json(&mut second, json!({ "type": "leave-room" })).await;
    assert_eq!(
        recv_msg(&mut second).await,
        ServerMessage::RoomLeft {
            room_id: RoomId::from("demo")
        }
    );
}

#[tokio::test]
async fn test_disconnect_message_closes_and_notifies() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;
    join_ready(&mut alice, "demo", "alice").await;
    join_ready(&mut bob, "demo", "bob").await;
    recv_msg(&mut alice).await; // user-connected(bob)

    send_json(&mut bob, json!({ "type": "disconnect", "reason": "bye" })).await;

    assert_eq!(recv_msg(&mut alice).await, user_disconnected("bob"));
}

// =========================================================================
// Errors
// =========================================================================

#[tokio::test]
async fn test_malformed_frame_gets_400_and_connection_survives() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/").await;

    ws.send(Message::text("not json".to_string())).await.unwrap();
    assert_eq!(error_code(&recv_msg(&mut ws).await), 400);

    send_json(&mut ws, json!({ "type": "no-such-event" })).await;
    assert_eq!(error_code(&recv_msg(&mut ws).await), 400);

    assert!(join_ready(&mut ws, "demo", "alice").await.is_empty());
}

#[tokio::test]
async fn test_duplicate_active_participant_gets_409() {
    let addr = start_server().await;
    let mut first = connect(&addr, "/").await;
    let mut second = connect(&addr, "/").await;
    join_ready(&mut first, "demo", "alice").await;

    send_json(
        &mut second,
        json!({ "type": "join-room", "room_id": "demo", "participant_id": "alice" }),
    )
    .await;

    assert_eq!(error_code(&recv_msg(&mut second).await), 409);
    // The first alice is untouched and nobody was notified.
    assert_silent(&mut first).await;
}

#[tokio::test]
async fn test_connecting_participant_taken_over_is_told() {
    let addr = start_server().await;
    let mut watcher = connect(&addr, "/").await;
    let mut first = connect(&addr, "/").await;
    let mut second = connect(&addr, "/").await;
    join_ready(&mut watcher, "demo", "carol").await;

    let register = json!({ "type": "join-room", "room_id": "demo", "participant_id": "alice" });
    send_json(&mut first, register.clone()).await;
    recv_msg(&mut first).await; // registered
    send_json(&mut second, register).await;

    assert!(matches!(
        recv_msg(&mut second).await,
        ServerMessage::Registered { .. }
    ));
    assert_eq!(error_code(&recv_msg(&mut first).await), 409);

    // Only the new connection can finish the join.
    send_json(&mut first, json!({ "type": "stream-ready" })).await;
    assert_eq!(error_code(&recv_msg(&mut first).await), 404);
    send_json(&mut second, json!({ "type": "stream-ready" })).await;
    assert!(matches!(
        recv_msg(&mut second).await,
        ServerMessage::RoomJoined { .. }
    ));
    assert_eq!(recv_msg(&mut watcher).await, user_connected("alice"));

    // Closing the superseded socket does not evict the new alice.
    drop(first);
    assert_silent(&mut watcher).await;
}

#[tokio::test]
async fn test_oversized_frame_drops_the_connection() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;
    join_ready(&mut alice, "demo", "alice").await;
    join_ready(&mut bob, "demo", "bob").await;
    recv_msg(&mut alice).await; // user-connected(bob)

    // The write may fail once the server hangs up.
    let _ = bob.send(Message::text("x".repeat(65 * 1024))).await;

    assert_eq!(recv_msg(&mut alice).await, user_disconnected("bob"));
}

#[tokio::test]
async fn test_second_join_on_same_connection_gets_409() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/").await;
    join_ready(&mut ws, "demo", "alice").await;

    send_json(
        &mut ws,
        json!({ "type": "join-room", "room_id": "other", "stream_ready": true }),
    )
    .await;

    assert_eq!(error_code(&recv_msg(&mut ws).await), 409);
}

#[tokio::test]
async fn test_out_of_order_messages_get_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/").await;

    send_json(&mut ws, json!({ "type": "stream-ready" })).await;
    assert_eq!(error_code(&recv_msg(&mut ws).await), 400);

    send_json(&mut ws, json!({ "type": "leave-room" })).await;
    assert_eq!(error_code(&recv_msg(&mut ws).await), 400);
}

// =========================================================================
// Keep-alive and lifecycle
// =========================================================================

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/").await;

    send_json(&mut ws, json!({ "type": "heartbeat", "client_time": 12345 })).await;

    match recv_msg(&mut ws).await {
        ServerMessage::HeartbeatAck { client_time, .. } => {
            assert_eq!(client_time, 12345);
        }
        other => panic!("expected heartbeat-ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_connection_is_dropped_and_room_notified() {
    let addr = start_server_with(
        HuddleServer::builder().idle_timeout(Duration::from_millis(300)),
    )
    .await;
    let mut alice = connect(&addr, "/").await;
    let mut bob = connect(&addr, "/").await;
    join_ready(&mut alice, "demo", "alice").await;
    join_ready(&mut bob, "demo", "bob").await;
    recv_msg(&mut alice).await; // user-connected(bob)

    // alice keeps heartbeating, bob goes silent.
    let mut bob_dropped = false;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_json(&mut alice, json!({ "type": "heartbeat", "client_time": 0 })).await;
        loop {
            match recv_msg(&mut alice).await {
                ServerMessage::HeartbeatAck { .. } => break,
                msg => {
                    assert_eq!(msg, user_disconnected("bob"));
                    bob_dropped = true;
                }
            }
        }
        if bob_dropped {
            break;
        }
    }

    assert!(bob_dropped, "bob should have timed out");
}

#[tokio::test]
async fn test_silent_socket_does_not_delay_other_joins() {
    let addr = start_server().await;

    // Opens TCP and never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr).await.unwrap();

    let joined = tokio::time::timeout(Duration::from_secs(2), async {
        let mut ws = connect(&addr, "/demo").await;
        join_ready(&mut ws, "demo", "alice").await
    })
    .await
    .expect("join should not wait on the silent socket");
    assert!(joined.is_empty());
}

#[tokio::test]
async fn test_server_future_can_be_spawned() {
    fn assert_send<T: Send>(_: &T) {}

    let server = HuddleServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let running = server.run_until(std::future::ready(()));
    assert_send(&running);

    tokio::spawn(running)
        .await
        .expect("server task should not panic")
        .expect("server should stop cleanly");
}

#[tokio::test]
async fn test_run_until_stops_accepting() {
    let server = HuddleServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(10)).await;
    connect(&addr, "/").await;

    stop_tx.send(()).unwrap();
    running
        .await
        .expect("server task should not panic")
        .expect("server should stop cleanly");

    assert!(
        tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .is_err()
    );
}
