//! Integration tests for end-to-end room synchronization.
//!
//! These tests start a real in-process room backend and connect real
//! channel clients, verifying the full edit pipeline.

mod common;

use common::{fast_config, start_http_server, start_room_server, start_scripted_server, Script};
use pairlink_collab::{
    ChannelClient, ChannelEvent, ChannelMessage, CollabError, ConnectionState, DocumentSync,
    RoomsClient, Session,
};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Connect a client and its document controller, waiting for the initial sync.
async fn join(
    url: &str,
    room_id: &str,
    name: &str,
) -> (
    ChannelClient,
    DocumentSync<pairlink_collab::ChannelHandle>,
    mpsc::Receiver<ChannelEvent>,
) {
    let session = Session::new(room_id, name);
    let mut client = ChannelClient::connect(session.clone(), fast_config(url)).unwrap();
    let mut events = client.take_event_rx().unwrap();
    let mut doc = DocumentSync::new(session, client.handle());

    // Drain until the server's sync has been applied.
    loop {
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("sync within timeout")
            .expect("event stream open");
        if let ChannelEvent::Message(message) = event {
            let is_sync = matches!(message, ChannelMessage::Sync { .. });
            doc.apply_inbound(&message);
            if is_sync {
                break;
            }
        }
    }
    (client, doc, events)
}

/// Apply inbound events until `done` holds for the document.
async fn pump_until(
    doc: &mut DocumentSync<pairlink_collab::ChannelHandle>,
    events: &mut mpsc::Receiver<ChannelEvent>,
    mut done: impl FnMut(&DocumentSync<pairlink_collab::ChannelHandle>) -> bool,
) {
    let result = timeout(Duration::from_secs(2), async {
        while !done(doc) {
            match events.recv().await {
                Some(ChannelEvent::Message(message)) => {
                    doc.apply_inbound(&message);
                }
                Some(ChannelEvent::StateChanged(_)) => {}
                None => break,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached within timeout");
}

#[tokio::test]
async fn test_sync_establishes_initial_state() {
    let server = start_room_server().await;
    server.seed_room("abc123", "print('hi')").await;

    let (client, doc, _events) = join(&server.ws_url, "abc123", "Ada").await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(doc.text(), "print('hi')");
    assert_eq!(doc.members(), &[doc.session().user_id().to_string()]);
}

#[tokio::test]
async fn test_display_name_with_space_joins() {
    let server = start_room_server().await;

    let (client, doc, _events) = join(&server.ws_url, "abc123", "Ada Lovelace").await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(doc.session().display_name(), "Ada Lovelace");
    assert_eq!(server.accepted(), 1);
    let users = server.room_users("abc123").await;
    assert_eq!(users, vec![doc.session().user_id().to_string()]);
    assert!(users[0].starts_with("Ada Lovelace_"));
}

#[tokio::test]
async fn test_two_clients_converge_on_typed_text() {
    let server = start_room_server().await;

    let (_a, mut doc_a, mut events_a) = join(&server.ws_url, "abc123", "Ada").await;
    let (_b, mut doc_b, mut events_b) = join(&server.ws_url, "abc123", "Bob").await;

    // A learns about B through user_joined.
    let b_id = doc_b.session().user_id().to_string();
    pump_until(&mut doc_a, &mut events_a, |d| d.members().contains(&b_id)).await;
    assert_eq!(doc_b.members().len(), 2);

    doc_a.apply_local_edit("x");
    pump_until(&mut doc_b, &mut events_b, |d| d.text() == "x").await;

    assert_eq!(doc_a.text(), "x");
    assert_eq!(doc_b.text(), "x");
    assert_eq!(server.room_code("abc123").await.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_edit_stream_is_ordered() {
    let server = start_room_server().await;

    let (_a, mut doc_a, _events_a) = join(&server.ws_url, "ordered", "Ada").await;
    let (_b, mut doc_b, mut events_b) = join(&server.ws_url, "ordered", "Bob").await;

    let mut seen = Vec::new();
    for text in ["d", "de", "def"] {
        doc_a.apply_local_edit(text);
    }
    let result = timeout(Duration::from_secs(2), async {
        while seen.len() < 3 {
            if let Some(ChannelEvent::Message(message)) = events_b.recv().await {
                if let ChannelMessage::CodeChange { code: Some(code), .. } = &message {
                    seen.push(code.clone());
                }
                doc_b.apply_inbound(&message);
            }
        }
    })
    .await;
    assert!(result.is_ok());
    assert_eq!(seen, vec!["d", "de", "def"]);
    assert_eq!(doc_b.text(), "def");
}

#[tokio::test]
async fn test_peer_leaving_updates_membership() {
    let server = start_room_server().await;

    let (_a, mut doc_a, mut events_a) = join(&server.ws_url, "leave", "Ada").await;
    let (b, doc_b, _events_b) = join(&server.ws_url, "leave", "Bob").await;
    let b_id = doc_b.session().user_id().to_string();

    pump_until(&mut doc_a, &mut events_a, |d| d.members().len() == 2).await;
    b.disconnect();
    pump_until(&mut doc_a, &mut events_a, |d| !d.members().contains(&b_id)).await;

    assert_eq!(doc_a.members().len(), 1);
}

#[tokio::test]
async fn test_remote_caret_relayed() {
    let server = start_room_server().await;

    let (_a, mut doc_a, _events_a) = join(&server.ws_url, "carets", "Ada").await;
    let (_b, mut doc_b, mut events_b) = join(&server.ws_url, "carets", "Bob").await;
    let a_id = doc_a.session().user_id().to_string();

    assert!(doc_a.publish_cursor(4));
    pump_until(&mut doc_b, &mut events_b, |d| d.caret_of(&a_id) == Some(4)).await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let frames = vec![
        "{not json".to_string(),
        r#"{"type":"user_typing","is_typing":true}"#.to_string(),
        r#"{"type":"code_change","code":"after garbage"}"#.to_string(),
    ];
    let (url, _accepted) = start_scripted_server(Script::Frames(frames)).await;

    let mut client =
        ChannelClient::connect(Session::from_parts("r", "ada_1"), fast_config(&url)).unwrap();
    let mut events = client.take_event_rx().unwrap();

    let mut messages = Vec::new();
    let result = timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if let ChannelEvent::Message(message) = event {
                messages.push(message);
                break;
            }
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(messages, vec![ChannelMessage::code_change("after garbage")]);
    assert_eq!(client.state(), ConnectionState::Open);
    client.disconnect();
}

#[tokio::test]
async fn test_create_room_returns_id() {
    let base = start_http_server(200, r#"{"room_id":"abc123"}"#).await;
    let rooms = RoomsClient::new(base);
    assert_eq!(rooms.create_room().await.unwrap(), "abc123");
}

#[tokio::test]
async fn test_create_room_failure_status() {
    let base = start_http_server(500, r#"{"detail":"Failed to create room"}"#).await;
    let rooms = RoomsClient::new(base);
    let result = rooms.create_room().await;
    assert!(matches!(result, Err(CollabError::Status(500))));
}
