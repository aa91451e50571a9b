//! In-process room backend for integration tests.
//!
//! Speaks the same contract as the production backend:
//! - `/ws/{room_id}/{user_id}` upgrades to a room channel
//! - `sync` (code + users) to the newcomer, `user_joined` to everyone else
//! - `code_change` / `cursor_position` relayed to every other peer
//! - `user_left` broadcast when a peer's socket ends
//! - `POST /rooms` over plain HTTP returns `{"room_id": ...}`

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pairlink_collab::{ChannelConfig, ChannelMessage, ReconnectPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

/// Find a free port for testing.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Backoff short enough for tests, same shape as production.
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        max_attempts: 5,
    }
}

pub fn fast_config(ws_base_url: &str) -> ChannelConfig {
    ChannelConfig {
        ws_base_url: ws_base_url.to_string(),
        reconnect: fast_policy(),
        event_capacity: 64,
    }
}

#[derive(Default)]
struct Room {
    code: String,
    users: Vec<String>,
    peers: Vec<(String, mpsc::UnboundedSender<String>)>,
}

impl Room {
    fn broadcast(&self, message: &ChannelMessage, exclude: Option<&str>) {
        let Ok(text) = message.encode() else { return };
        for (user, tx) in &self.peers {
            if Some(user.as_str()) != exclude {
                let _ = tx.send(text.clone());
            }
        }
    }
}

type Rooms = Arc<RwLock<HashMap<String, Room>>>;

/// A running relay.
pub struct TestRoomServer {
    pub ws_url: String,
    pub accepted: Arc<AtomicUsize>,
    rooms: Rooms,
}

impl TestRoomServer {
    pub async fn room_code(&self, room_id: &str) -> Option<String> {
        self.rooms.read().await.get(room_id).map(|r| r.code.clone())
    }

    pub async fn room_users(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|r| r.users.clone())
            .unwrap_or_default()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Pre-seed a room's code before anyone connects.
    pub async fn seed_room(&self, room_id: &str, code: &str) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.to_string()).or_default().code = code.to_string();
    }
}

/// Start a relay on a free port.
pub async fn start_room_server() -> TestRoomServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let rooms: Rooms = Arc::new(RwLock::new(HashMap::new()));
    let accepted = Arc::new(AtomicUsize::new(0));

    let server_rooms = rooms.clone();
    let server_accepted = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            server_accepted.fetch_add(1, Ordering::SeqCst);
            let rooms = server_rooms.clone();
            tokio::spawn(async move {
                handle_room_connection(stream, rooms).await;
            });
        }
    });

    TestRoomServer {
        ws_url: format!("ws://127.0.0.1:{port}"),
        accepted,
        rooms,
    }
}

async fn handle_room_connection(stream: TcpStream, rooms: Rooms) {
    let mut path = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().path().to_string();
        Ok(resp)
    };
    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let (room_id, user_id) = match parts.as_slice() {
        ["ws", room, user] => match (urlencoding::decode(room), urlencoding::decode(user)) {
            (Ok(room), Ok(user)) => (room.into_owned(), user.into_owned()),
            _ => return,
        },
        _ => return,
    };

    let (mut writer, mut reader) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let sync = {
        let mut rooms_w = rooms.write().await;
        let room = rooms_w.entry(room_id.clone()).or_default();
        if !room.users.contains(&user_id) {
            room.users.push(user_id.clone());
        }
        room.peers.push((user_id.clone(), tx));
        room.broadcast(
            &ChannelMessage::UserJoined {
                user_id: Some(user_id.clone()),
                users: Some(room.users.clone()),
            },
            Some(&user_id),
        );
        ChannelMessage::Sync {
            code: Some(room.code.clone()),
            users: Some(room.users.clone()),
        }
    };
    if let Ok(text) = sync.encode() {
        if writer.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(message) = ChannelMessage::decode(text.as_str()) else { continue };
                    let mut rooms_w = rooms.write().await;
                    let Some(room) = rooms_w.get_mut(&room_id) else { continue };
                    match message {
                        ChannelMessage::CodeChange { code, .. } => {
                            let code = code.unwrap_or_default();
                            room.code = code.clone();
                            room.broadcast(
                                &ChannelMessage::CodeChange {
                                    code: Some(code),
                                    user_id: Some(user_id.clone()),
                                },
                                Some(&user_id),
                            );
                        }
                        ChannelMessage::CursorPosition { position, .. } => {
                            room.broadcast(
                                &ChannelMessage::CursorPosition {
                                    position,
                                    user_id: Some(user_id.clone()),
                                },
                                Some(&user_id),
                            );
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            outgoing = rx.recv() => match outgoing {
                Some(text) => {
                    if writer.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let mut rooms_w = rooms.write().await;
    if let Some(room) = rooms_w.get_mut(&room_id) {
        room.peers.retain(|(user, _)| user != &user_id);
        room.users.retain(|user| user != &user_id);
        room.broadcast(
            &ChannelMessage::UserLeft {
                user_id: Some(user_id.clone()),
                users: Some(room.users.clone()),
            },
            None,
        );
    }
}

/// How a scripted server treats each accepted channel.
#[derive(Debug, Clone)]
pub enum Script {
    /// Complete the handshake, then drop the TCP stream (abnormal close).
    Drop,
    /// Complete the handshake, then send a close frame with this code.
    Close(u16),
    /// Send these raw text frames, then stay open.
    Frames(Vec<String>),
}

/// Start a server that runs `script` on every accepted connection.
pub async fn start_scripted_server(script: Script) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let script = script.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                match script {
                    Script::Drop => drop(ws),
                    Script::Close(code) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: Utf8Bytes::from_static("scripted close"),
                        };
                        let _ = ws.close(Some(frame)).await;
                    }
                    Script::Frames(frames) => {
                        for frame in frames {
                            if ws.send(Message::Text(frame.into())).await.is_err() {
                                return;
                            }
                        }
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                }
            });
        }
    });

    (format!("ws://127.0.0.1:{port}"), accepted)
}

/// Start a minimal HTTP responder for `POST /rooms`.
///
/// Answers every request with `status` and `body`.
pub async fn start_http_server(status: u16, body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let body = body.to_string();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { break };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://127.0.0.1:{port}")
}

/// A server on its own thread and runtime that accepts channels and drops
/// the open socket only when told to.
///
/// Lets a test block its own runtime while the drop lands, so the client sees
/// the EOF and a later command at the same time.
pub struct DetachedDropServer {
    pub ws_url: String,
    pub accepted: Arc<AtomicUsize>,
    drop_tx: std::sync::mpsc::Sender<()>,
}

impl DetachedDropServer {
    /// Drop the currently open socket.
    pub fn drop_socket(&self) {
        let _ = self.drop_tx.send(());
    }
}

pub fn start_detached_drop_server() -> DetachedDropServer {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let port = std_listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let (drop_tx, drop_rx) = std::sync::mpsc::channel::<()>();

    let counter = accepted.clone();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = TcpListener::from_std(std_listener).unwrap();
            let drop_rx = Arc::new(std::sync::Mutex::new(drop_rx));
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let drop_rx = drop_rx.clone();
                let signalled = tokio::task::spawn_blocking(move || {
                    drop_rx.lock().map(|rx| rx.recv().is_ok()).unwrap_or(false)
                })
                .await
                .unwrap_or(false);
                drop(ws);
                if !signalled {
                    break;
                }
            }
        });
    });

    DetachedDropServer {
        ws_url: format!("ws://127.0.0.1:{port}"),
        accepted,
        drop_tx,
    }
}
