//! Integration tests for the edit session against an in-process
//! WebSocket server.
//!
//! Covers the full path: connection lifecycle, change frames, malformed
//! frames, permission-gated edits, normal close, and reconnection after an
//! abnormal drop.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    accept_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
    tungstenite::Message,
    WebSocketStream,
};
use url::Url;

use coedit_client::{ChannelTarget, EditSession, SessionUpdate};
use coedit_core::connection::ConnectionState;
use coedit_core::document::{Collaborator, Document, DocumentContent, Permission, User};

const OWNER_ID: u64 = 7;
const VIEWER_ID: u64 = 5;

fn test_document() -> Document {
    Document {
        id: 42,
        title: "shared notes".into(),
        content: DocumentContent { text: "initial".into() },
        owner: User { id: OWNER_ID, username: "ana".into() },
        collaborators: vec![Collaborator {
            id: 1,
            user: User { id: VIEWER_ID, username: "vic".into() },
            permission: Permission::View,
        }],
        created_at: "2024-01-01T00:00:00Z".into(),
        updated_at: "2024-01-01T00:00:00Z".into(),
    }
}

async fn bind_server() -> (TcpListener, ChannelTarget) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("ws://{}", addr)).expect("base url");
    let target = ChannelTarget::new(&base, 42, "test-token").expect("target");
    (listener, target)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    accept_async(stream).await.expect("ws upgrade")
}

/// Connect a session for `user_id` and return the server end.
async fn connected_session(user_id: u64) -> (EditSession, WebSocketStream<TcpStream>) {
    let (listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), user_id, target);
    session.start();

    // First event is the successful open.
    let (server_ws, update) = tokio::join!(accept_ws(&listener), next_update(&mut session));
    assert_eq!(update, SessionUpdate::Status);
    assert!(session.status().connected());

    (session, server_ws)
}

fn change_frame(text: &str) -> Message {
    Message::Text(
        serde_json::json!({"type": "change", "content": {"text": text}}).to_string(),
    )
}

async fn next_update(session: &mut EditSession) -> SessionUpdate {
    timeout(Duration::from_secs(1), session.poll())
        .await
        .expect("poll timed out")
        .expect("event stream ended")
}

/// Drain status updates until the reconnect slot is armed.
///
/// A raw TCP drop surfaces as a transport error followed by the close, so
/// one or two status updates may arrive before the timer is scheduled.
async fn await_reconnect_scheduled(session: &mut EditSession) {
    for _ in 0..3 {
        next_update(session).await;
        if session.connection_state() == ConnectionState::ReconnectScheduled {
            return;
        }
    }
    panic!("connection never reached ReconnectScheduled");
}

#[tokio::test]
async fn test_remote_changes_apply_last_write_wins() {
    let (mut session, mut server_ws) = connected_session(OWNER_ID).await;

    server_ws.send(change_frame("A")).await.unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::RemoteChange);
    assert_eq!(session.text(), "A");

    server_ws.send(change_frame("B")).await.unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::RemoteChange);
    assert_eq!(session.text(), "B");

    session.teardown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_transient_and_keeps_connection() {
    let (mut session, mut server_ws) = connected_session(OWNER_ID).await;

    server_ws.send(change_frame("A")).await.unwrap();
    next_update(&mut session).await;

    // Garbage frame: warning raised, text untouched, connection stays up.
    server_ws
        .send(Message::Text("not json at all".into()))
        .await
        .unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::Status);
    assert!(session.status().transient_warning().is_some());
    assert_eq!(session.text(), "A");
    assert_eq!(session.connection_state(), ConnectionState::Open);

    // A change missing content.text is malformed too.
    session.dismiss_warning();
    server_ws
        .send(Message::Text(r#"{"type": "change", "content": {}}"#.into()))
        .await
        .unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::Status);
    assert!(session.status().transient_warning().is_some());
    assert_eq!(session.text(), "A");

    // The channel still works afterwards.
    server_ws.send(change_frame("C")).await.unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::RemoteChange);
    assert_eq!(session.text(), "C");

    session.teardown().await;
}

#[tokio::test]
async fn test_local_edit_reaches_server_as_snapshot() {
    let (mut session, mut server_ws) = connected_session(OWNER_ID).await;

    session.edit("hello world".into()).await.unwrap();
    assert_eq!(session.text(), "hello world");

    let frame = timeout(Duration::from_secs(1), server_ws.next())
        .await
        .expect("no frame arrived")
        .expect("stream ended")
        .expect("ws error");
    let text = match frame {
        Message::Text(t) => t,
        other => panic!("expected text frame, got {:?}", other),
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, serde_json::json!({"content": {"text": "hello world"}}));

    session.teardown().await;
}

#[tokio::test]
async fn test_view_user_edit_rejected_and_nothing_sent() {
    let (mut session, mut server_ws) = connected_session(VIEWER_ID).await;
    assert!(!session.can_edit());

    assert!(session.edit("sneaky".into()).await.is_err());
    assert_eq!(session.text(), "initial");

    // No outbound frame within the grace window.
    let nothing = timeout(Duration::from_millis(300), server_ws.next()).await;
    assert!(nothing.is_err(), "viewer edit must not produce a send");

    session.teardown().await;
}

#[tokio::test]
async fn test_normal_close_ends_session_without_retry() {
    let (mut session, mut server_ws) = connected_session(OWNER_ID).await;

    server_ws
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "done".into(),
        }))
        .await
        .unwrap();

    assert_eq!(next_update(&mut session).await, SessionUpdate::Ended);
    assert_eq!(session.connection_state(), ConnectionState::ClosedFinal);
    assert!(!session.status().connected());

    session.teardown().await;
}

#[tokio::test]
async fn test_abnormal_drop_schedules_reconnect_and_recovers() {
    let (listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), OWNER_ID, target);

    session.start();
    let (server_ws, _) = tokio::join!(accept_ws(&listener), next_update(&mut session));

    // Drop the TCP side without a close frame: abnormal close.
    drop(server_ws);

    await_reconnect_scheduled(&mut session).await;
    assert!(session.status().banner().is_some());

    // First retry fires after 1000ms; accept it and expect recovery.
    let (mut server_ws, update) = tokio::join!(accept_ws(&listener), async {
        timeout(Duration::from_secs(3), session.poll())
            .await
            .expect("reconnect timed out")
            .expect("event stream ended")
    });
    assert_eq!(update, SessionUpdate::Status);
    assert!(session.status().connected());
    assert!(session.status().banner().is_none());

    // The recovered channel carries edits again.
    session.edit("back online".into()).await.unwrap();
    let frame = timeout(Duration::from_secs(1), server_ws.next())
        .await
        .expect("no frame arrived")
        .expect("stream ended")
        .expect("ws error");
    assert!(matches!(frame, Message::Text(_)));

    session.teardown().await;
}

#[tokio::test]
async fn test_edit_while_disconnected_is_local_only_and_not_resent() {
    let (listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), OWNER_ID, target);

    session.start();
    let (server_ws, _) = tokio::join!(accept_ws(&listener), next_update(&mut session));

    drop(server_ws);
    await_reconnect_scheduled(&mut session).await;

    // Edit while down: applied locally, flagged, warned - never queued.
    session.edit("offline edit".into()).await.unwrap();
    assert_eq!(session.text(), "offline edit");
    assert!(session.unsynced());
    assert!(session.status().transient_warning().is_some());

    // Recover the connection; the offline edit must NOT be replayed.
    let (mut server_ws, _) = tokio::join!(accept_ws(&listener), async {
        timeout(Duration::from_secs(3), session.poll())
            .await
            .expect("reconnect timed out")
            .expect("event stream ended")
    });
    let nothing = timeout(Duration::from_millis(300), server_ws.next()).await;
    assert!(nothing.is_err(), "offline edits must not be retransmitted");
    assert!(session.unsynced());

    // The "not connected" warning does not outlive the recovery.
    assert!(session.status().transient_warning().is_none());

    session.teardown().await;
}

#[tokio::test]
async fn test_poll_cancelled_mid_reconnect_still_recovers() {
    let (listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), OWNER_ID, target);

    session.start();
    let (server_ws, _) = tokio::join!(accept_ws(&listener), next_update(&mut session));

    drop(server_ws);
    await_reconnect_scheduled(&mut session).await;

    // Drop the poll future while the retry handshake is in flight (the
    // server is not accepting the upgrade). The binary's select! loop over
    // stdin and signals does exactly this.
    tokio::select! {
        update = session.poll() => panic!("unexpected update while server is silent: {:?}", update),
        _ = sleep(Duration::from_millis(1300)) => {}
    }

    // The attempt must survive the cancellation: accept it and recover.
    let (mut server_ws, update) = tokio::join!(accept_ws(&listener), async {
        timeout(Duration::from_secs(3), session.poll())
            .await
            .expect("reconnect lost after cancelled poll")
            .expect("event stream ended")
    });
    assert_eq!(update, SessionUpdate::Status);
    assert!(session.status().connected());
    assert_eq!(session.connection_state(), ConnectionState::Open);

    // The recovered channel still carries changes.
    server_ws.send(change_frame("recovered")).await.unwrap();
    assert_eq!(next_update(&mut session).await, SessionUpdate::RemoteChange);
    assert_eq!(session.text(), "recovered");

    session.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_warning_auto_dismisses() {
    let (_listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), OWNER_ID, target);

    // Edit before the connection opens: applied locally, warning raised.
    session.edit("offline".into()).await.unwrap();
    assert!(session.status().transient_warning().is_some());

    let update = timeout(Duration::from_secs(10), session.poll())
        .await
        .expect("warning never expired")
        .expect("event stream ended");
    assert_eq!(update, SessionUpdate::Status);
    assert!(session.status().transient_warning().is_none());
}

#[tokio::test]
async fn test_teardown_is_idempotent_and_cancels_reconnect() {
    let (listener, target) = bind_server().await;
    let mut session = EditSession::new(test_document(), OWNER_ID, target);

    session.start();
    let (server_ws, _) = tokio::join!(accept_ws(&listener), next_update(&mut session));

    // Arm the reconnect slot, then tear down while the timer is pending.
    drop(server_ws);
    await_reconnect_scheduled(&mut session).await;

    session.teardown().await;
    session.teardown().await;
    assert_eq!(session.connection_state(), ConnectionState::ClosedFinal);

    // No reconnect may arrive after teardown, even past the backoff delay.
    let late = timeout(Duration::from_millis(1500), listener.accept()).await;
    assert!(late.is_err(), "teardown must cancel the pending reconnect");
}
