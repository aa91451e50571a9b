//! WebSocket channel client for one collaboration room.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect, bounded reconnect)
//! - Typed send/receive of [`ChannelMessage`] JSON frames
//! - Connection-state reporting for a UI indicator
//!
//! A single background task owns the socket and the [`ConnectionState`].
//! Callers talk to it through ordered channels:
//!
//! ```text
//!  ChannelHandle ──Command──► ┌──────────────────┐ ──frames──► server
//!   (send/disconnect)         │ ConnectionTask   │
//!  event_rx ◄──ChannelEvent── │ (owns socket +   │ ◄─frames─── server
//!  state watch ◄───────────── │  state + retry)  │
//!                             └──────────────────┘
//! ```
//!
//! State machine:
//!
//! ```text
//! Connecting ──open──► Open ──close 1000 / disconnect()──► ClosedClean
//!     ▲                 │
//!     │            abnormal close / open failure
//!     │                 ▼
//!     └──backoff── ClosedRetrying ──attempts exhausted──► ClosedGivenUp
//! ```
//!
//! Delivery is best-effort: a send while the channel is not open is dropped
//! with a warning, never queued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

use crate::error::CollabError;
use crate::protocol::ChannelMessage;
use crate::session::Session;

/// Close reason sent with a client-initiated clean close.
pub const MANUAL_DISCONNECT_REASON: &str = "Manual disconnect";

/// Connection state, owned by the connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedClean,
    ClosedRetrying,
    ClosedGivenUp,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// No further connection attempts will be made.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedClean | Self::ClosedGivenUp)
    }
}

/// Exponential backoff for reconnection.
///
/// The delay before retry `attempt` (starting at 0) is
/// `min(base_delay * 2^attempt, max_delay)`. After `max_attempts` retries
/// have failed, no further retry is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for the given attempt, ignoring the attempt cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next retry, or `None` once attempts are exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.delay_for(attempt))
    }
}

/// Channel client configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base WebSocket URL, e.g. `ws://localhost:8000`
    pub ws_base_url: String,
    pub reconnect: ReconnectPolicy,
    /// Inbound event buffer; a slow consumer applies backpressure to the socket.
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "ws://localhost:8000".to_string(),
            reconnect: ReconnectPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl ChannelConfig {
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            ..Self::default()
        }
    }

    /// `{base}/ws/{room_id}/{user_id}`, with both ids percent-encoded.
    pub fn room_url(&self, session: &Session) -> String {
        format!(
            "{}/ws/{}/{}",
            self.ws_base_url.trim_end_matches('/'),
            urlencoding::encode(session.room_id()),
            urlencoding::encode(session.user_id())
        )
    }
}

/// Events delivered to the single subscriber of a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    Message(ChannelMessage),
}

#[derive(Debug)]
enum Command {
    Send(ChannelMessage),
    Disconnect,
}

/// Cloneable handle for sending on a channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    /// Send a message if the channel is open; otherwise drop it with a warning.
    pub fn send(&self, message: ChannelMessage) {
        let kind = message.kind();
        if let Err(e) = self.try_send(message) {
            log::warn!("Message not sent ({kind}): {e}");
        }
    }

    /// Send a message, reporting [`CollabError::NotConnected`] instead of logging.
    pub fn try_send(&self, message: ChannelMessage) -> Result<(), CollabError> {
        if !self.state().is_open() {
            return Err(CollabError::NotConnected);
        }
        self.commands
            .send(Command::Send(message))
            .map_err(|_| CollabError::NotConnected)
    }

    /// Close with code 1000 and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns `None` if the connection task ended without reaching it.
    pub async fn wait_for_state(
        &self,
        mut predicate: impl FnMut(ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        let mut state = self.state.clone();
        state.wait_for(|s| predicate(*s)).await.ok().map(|s| *s)
    }
}

/// The channel client.
///
/// Owns the background connection task for one [`Session`].
pub struct ChannelClient {
    session: Session,
    handle: ChannelHandle,
    event_rx: Option<mpsc::Receiver<ChannelEvent>>,
    task: JoinHandle<()>,
}

impl ChannelClient {
    /// Start connecting to the session's room.
    ///
    /// Refuses (with a warning) when either identifier is empty; nothing is
    /// spawned in that case. Must be called inside a tokio runtime.
    pub fn connect(session: Session, config: ChannelConfig) -> Result<Self, CollabError> {
        if !session.is_complete() {
            log::warn!("Cannot connect channel: missing room id or user id");
            return Err(CollabError::MissingIdentity);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));

        let task = ConnectionTask {
            url: config.room_url(&session),
            policy: config.reconnect,
            commands: command_rx,
            state: state_tx,
            events: event_tx,
            attempt: 0,
            manual_close: false,
        };
        let task = tokio::spawn(task.run());

        Ok(Self {
            session,
            handle: ChannelHandle {
                commands: command_tx,
                state: state_rx,
            },
            event_rx: Some(event_rx),
            task,
        })
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.event_rx.take()
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn send(&self, message: ChannelMessage) {
        self.handle.send(message);
    }

    pub fn disconnect(&self) {
        self.handle.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Wait for the connection task to finish (clean close or given up).
    pub async fn closed(self) -> ConnectionState {
        let _ = self.task.await;
        self.handle.state()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseKind {
    Clean,
    Abnormal,
}

/// Single owner of the socket and the connection state.
struct ConnectionTask {
    url: String,
    policy: ReconnectPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<ChannelEvent>,
    attempt: u32,
    /// Set by `disconnect()`; wins over whatever close the socket reports.
    manual_close: bool,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting).await;

            if self.connect_once().await == CloseKind::Clean {
                self.set_state(ConnectionState::ClosedClean).await;
                break;
            }

            let Some(delay) = self.policy.next_delay(self.attempt) else {
                log::warn!(
                    "Giving up on {} after {} reconnect attempts",
                    self.url,
                    self.attempt
                );
                self.set_state(ConnectionState::ClosedGivenUp).await;
                break;
            };

            self.set_state(ConnectionState::ClosedRetrying).await;
            if !self.wait_backoff(delay).await {
                self.set_state(ConnectionState::ClosedClean).await;
                break;
            }
            self.attempt += 1;
            log::info!("Reconnecting... attempt {}", self.attempt);
        }
    }

    async fn set_state(&mut self, state: ConnectionState) {
        self.state.send_replace(state);
        let _ = self.events.send(ChannelEvent::StateChanged(state)).await;
    }

    fn close_kind(&mut self, peer_code: Option<CloseCode>) -> CloseKind {
        if self.manual_close || self.disconnect_queued() || peer_code == Some(CloseCode::Normal) {
            CloseKind::Clean
        } else {
            CloseKind::Abnormal
        }
    }

    /// Drain commands that raced with the socket closing. A queued
    /// disconnect still makes the close clean.
    fn disconnect_queued(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Send(message)) => {
                    log::warn!("Channel is not open. Message not sent: {}", message.kind());
                }
                Ok(Command::Disconnect) | Err(TryRecvError::Disconnected) => {
                    self.manual_close = true;
                    return true;
                }
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    /// Sleep out the backoff. Returns `false` if disconnected meanwhile.
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => {
                        log::warn!("Channel is not open. Message not sent: {}", message.kind());
                    }
                    Some(Command::Disconnect) | None => {
                        self.manual_close = true;
                        return false;
                    }
                },
            }
        }
    }

    /// Open one socket and pump it until it closes.
    async fn connect_once(&mut self) -> CloseKind {
        // An open attempt is never cancelled; a disconnect during it is
        // honoured once the attempt completes.
        let result = {
            let opening = tokio_tungstenite::connect_async(self.url.as_str());
            tokio::pin!(opening);
            loop {
                tokio::select! {
                    result = &mut opening => break result,
                    command = self.commands.recv(), if !self.manual_close => match command {
                        Some(Command::Send(message)) => {
                            log::warn!("Channel is not open. Message not sent: {}", message.kind());
                        }
                        Some(Command::Disconnect) | None => self.manual_close = true,
                    },
                }
            }
        };

        let mut ws = match result {
            Ok((ws, _)) => ws,
            Err(e) => {
                log::error!("Error opening channel to {}: {e}", self.url);
                return self.close_kind(None);
            }
        };

        if self.manual_close {
            let _ = ws.close(Some(manual_close_frame())).await;
            return CloseKind::Clean;
        }

        self.attempt = 0;
        log::info!("Channel connected: {}", self.url);
        self.set_state(ConnectionState::Open).await;

        let (mut writer, mut reader) = ws.split();
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => match message.encode() {
                        Ok(text) => {
                            if let Err(e) = writer.send(Message::Text(text.into())).await {
                                log::warn!("Channel write failed: {e}");
                                return self.close_kind(None);
                            }
                        }
                        Err(e) => log::error!("Failed to encode {}: {e}", message.kind()),
                    },
                    Some(Command::Disconnect) | None => {
                        self.manual_close = true;
                        let close = Message::Close(Some(manual_close_frame()));
                        if let Err(e) = writer.send(close).await {
                            log::debug!("Close frame not delivered: {e}");
                        }
                        return CloseKind::Clean;
                    }
                },
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()).await,
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| f.code);
                        log::info!("Channel closed by server: {code:?}");
                        return self.close_kind(code);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        log::error!("Dropping binary frame: channel protocol is JSON text");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("Channel error: {e}");
                        return self.close_kind(None);
                    }
                    None => return self.close_kind(None),
                },
            }
        }
    }

    async fn dispatch(&self, text: &str) {
        match ChannelMessage::decode(text) {
            Ok(message) => {
                let _ = self.events.send(ChannelEvent::Message(message)).await;
            }
            Err(e) => log::error!("Error parsing channel message: {e}"),
        }
    }
}

fn manual_close_frame() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(MANUAL_DISCONNECT_REASON),
    }
}
