//! WebSocket connection manager for one editing session.
//!
//! Owns the session's single connection slot: the socket, the read task, the
//! in-flight dial task, and the single-slot reconnect timer. State
//! transitions come from the [`ConnectionFsm`] in coedit-core; this module
//! supplies the I/O around it.
//!
//! Invariants enforced here:
//! - at most one live socket and one pending reconnect timer at any time
//! - sending while not Open is rejected synchronously, never queued
//! - teardown cancels the timer before closing the socket, in that order
//!
//! [`ConnectionManager::poll_events`] is cancel-safe: its only await point is
//! the internal event channel. Connect attempts run in a spawned task and
//! report their outcome over the same channel, so dropping the poll future
//! mid-retry (as a caller's `select!` loop will) loses nothing.

use std::fmt;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame},
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use coedit_core::connection::{
    CloseDisposition, ConnectionFsm, ConnectionState, ABNORMAL_CLOSE_CODE, NORMAL_CLOSE_CODE,
};

use crate::target::ChannelTarget;

/// Maximum inbound frame size (1MB). Larger frames are dropped with a log.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Why the connection is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// Transport-level error; the following close event drives any retry.
    TransportError,
    /// Abnormal close; a reconnect is scheduled.
    Reconnecting,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::TransportError => write!(f, "transport error"),
            DegradeReason::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Event emitted by the connection manager to the session.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The connection opened (initial or after a reconnect).
    Opened,
    /// A raw inbound frame.
    MessageReceived(Vec<u8>),
    /// Connection trouble; persistent until the next successful open.
    Degraded(DegradeReason),
    /// Retry budget exhausted; the session is terminal.
    Fatal(String),
    /// The remote side closed with the normal code; no retry.
    Closed,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is not open")]
    NotOpen,

    #[error("payload is not valid UTF-8 text")]
    InvalidPayload,

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Internal events from the dial task, the read task, and the timer.
struct SocketEvent {
    /// Which dial generation produced this; stale events are dropped.
    generation: u64,
    kind: SocketEventKind,
}

enum SocketEventKind {
    /// The spawned connect attempt finished.
    DialOutcome(Result<Box<WsStream>, String>),
    Frame(Vec<u8>),
    TransportError(String),
    Closed { code: u16 },
    ReconnectDue,
}

/// Manager for the session's single WebSocket connection.
pub struct ConnectionManager {
    target: ChannelTarget,
    fsm: ConnectionFsm,
    /// Write half of the current socket, if any.
    write: Option<WsSink>,
    read_task: Option<JoinHandle<()>>,
    /// In-flight connect attempt, if any.
    dial_task: Option<JoinHandle<()>>,
    /// The single reconnect slot.
    reconnect_timer: Option<JoinHandle<()>>,
    /// Bumped on every dial; events from older attempts are ignored.
    generation: u64,
    socket_tx: mpsc::UnboundedSender<SocketEvent>,
    socket_rx: mpsc::UnboundedReceiver<SocketEvent>,
}

impl ConnectionManager {
    /// Create a manager for one channel target. The target carries the
    /// credential explicitly; nothing is read from ambient state.
    pub fn new(target: ChannelTarget) -> Self {
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        Self {
            target,
            fsm: ConnectionFsm::new(),
            write: None,
            read_task: None,
            dial_task: None,
            reconnect_timer: None,
            generation: 0,
            socket_tx,
            socket_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    /// Consecutive abnormal closes since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.fsm.attempts()
    }

    /// Open the connection. No-op while a connection is already open or in
    /// flight, and after the terminal state.
    ///
    /// Returns immediately; the outcome arrives via [`Self::poll_events`]
    /// as `Opened` or a degraded/fatal event.
    pub fn open(&mut self) {
        if !self.fsm.can_open() {
            debug!(state = ?self.fsm.state(), "open ignored");
            return;
        }

        // A manual open supersedes a pending timer; the slot stays single.
        self.cancel_reconnect_timer();

        self.fsm.on_connecting();
        self.spawn_dial();
    }

    /// Send a raw frame. Rejected synchronously unless the connection is
    /// Open; nothing is ever queued.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<(), SendError> {
        if self.fsm.state() != ConnectionState::Open {
            return Err(SendError::NotOpen);
        }
        let write = self.write.as_mut().ok_or(SendError::NotOpen)?;

        // Frames are JSON; the server expects text.
        let text = std::str::from_utf8(payload).map_err(|_| SendError::InvalidPayload)?;
        write
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }

    /// Intentional close for session teardown. Idempotent.
    ///
    /// Order matters: the timer is cancelled before the socket closes, so a
    /// firing timer can never race a stale connection into existence.
    pub async fn close_intentionally(&mut self) {
        self.cancel_reconnect_timer();
        if let Some(task) = self.dial_task.take() {
            task.abort();
        }
        self.fsm.on_intentional_close();

        if let Some(mut write) = self.write.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "session teardown".into(),
            };
            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                debug!("close frame not delivered: {}", e);
            }
        }
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }

    /// Next event for the session. Drives reconnection internally: timer
    /// expiries, dial outcomes, and socket closes never surface raw, only
    /// their outcome.
    ///
    /// Cancel-safe: the only await is the event channel, and every event is
    /// processed synchronously once received.
    pub async fn poll_events(&mut self) -> Option<ConnectionEvent> {
        loop {
            let SocketEvent { generation, kind } = self.socket_rx.recv().await?;

            match kind {
                SocketEventKind::DialOutcome(result) => {
                    if generation != self.generation {
                        // Superseded attempt; dropping the stream closes it.
                        continue;
                    }
                    self.dial_task = None;
                    if self.fsm.state() != ConnectionState::Connecting {
                        // Teardown raced the outcome; discard the socket.
                        continue;
                    }
                    match result {
                        Ok(ws_stream) => {
                            self.adopt_socket(*ws_stream);
                            self.fsm.on_open();
                            info!(target = self.target.as_str(), "connection established");
                            return Some(ConnectionEvent::Opened);
                        }
                        Err(e) => {
                            warn!("connect failed: {}", e);
                            return Some(self.after_abnormal_close());
                        }
                    }
                }
                SocketEventKind::Frame(data) => {
                    if generation != self.generation {
                        continue;
                    }
                    return Some(ConnectionEvent::MessageReceived(data));
                }
                SocketEventKind::TransportError(e) => {
                    if generation != self.generation {
                        continue;
                    }
                    warn!("transport error: {}", e);
                    // No reconnect action here; the close event drives it.
                    return Some(ConnectionEvent::Degraded(DegradeReason::TransportError));
                }
                SocketEventKind::Closed { code } => {
                    if generation != self.generation {
                        continue;
                    }
                    if self.fsm.state() == ConnectionState::ClosedFinal {
                        // Teardown already ran; nothing left to drive.
                        continue;
                    }
                    self.drop_socket();
                    if code == NORMAL_CLOSE_CODE {
                        info!("connection closed normally by remote");
                        self.fsm.on_intentional_close();
                        return Some(ConnectionEvent::Closed);
                    }
                    debug!(code, "abnormal close");
                    return Some(self.after_abnormal_close());
                }
                SocketEventKind::ReconnectDue => {
                    // Honor the timer only if the slot is still armed.
                    if self.fsm.state() != ConnectionState::ReconnectScheduled {
                        continue;
                    }
                    self.reconnect_timer = None;
                    info!(attempt = self.fsm.attempts(), "reconnecting");
                    self.fsm.on_connecting();
                    self.spawn_dial();
                }
            }
        }
    }

    /// Start a connect attempt in its own task.
    ///
    /// The attempt outlives any cancelled poll future; its outcome is
    /// delivered over the event channel tagged with this generation.
    fn spawn_dial(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let url = self.target.as_str().to_string();
        let tx = self.socket_tx.clone();

        self.dial_task = Some(tokio::spawn(async move {
            let outcome = match connect_async(&url).await {
                Ok((ws_stream, _)) => Ok(Box::new(ws_stream)),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(SocketEvent {
                generation,
                kind: SocketEventKind::DialOutcome(outcome),
            });
        }));
    }

    /// Take ownership of a freshly opened socket and spawn its read task.
    fn adopt_socket(&mut self, ws_stream: WsStream) {
        let (write, read) = ws_stream.split();
        self.write = Some(write);

        let generation = self.generation;
        let tx = self.socket_tx.clone();
        self.read_task = Some(tokio::spawn(async move {
            Self::read_loop(generation, read, tx).await;
        }));
    }

    /// Read loop that forwards frames and the final close to the manager.
    async fn read_loop(
        generation: u64,
        mut read: WsSource,
        tx: mpsc::UnboundedSender<SocketEvent>,
    ) {
        let send = |kind| {
            let _ = tx.send(SocketEvent { generation, kind });
        };

        let mut close_code = ABNORMAL_CLOSE_CODE;
        loop {
            match read.next().await {
                Some(Ok(msg)) => {
                    let data = match msg {
                        Message::Text(text) => text.into_bytes(),
                        Message::Binary(data) => data,
                        Message::Ping(_) | Message::Pong(_) => continue,
                        Message::Close(frame) => {
                            close_code = frame
                                .map(|f| u16::from(f.code))
                                .unwrap_or(ABNORMAL_CLOSE_CODE);
                            debug!(code = close_code, "received close frame");
                            break;
                        }
                        Message::Frame(_) => continue,
                    };

                    if data.len() > MAX_FRAME_SIZE {
                        warn!(
                            "inbound frame exceeds max size ({} > {}), dropping",
                            data.len(),
                            MAX_FRAME_SIZE
                        );
                        continue;
                    }

                    send(SocketEventKind::Frame(data));
                }
                Some(Err(e)) => {
                    match e {
                        WsError::ConnectionClosed | WsError::AlreadyClosed => {
                            debug!("connection closed");
                        }
                        _ => {
                            error!("websocket error: {}", e);
                            send(SocketEventKind::TransportError(e.to_string()));
                        }
                    }
                    break;
                }
                None => {
                    debug!("stream ended");
                    break;
                }
            }
        }

        send(SocketEventKind::Closed { code: close_code });
    }

    /// Run the close disposition: arm the reconnect slot or go terminal.
    fn after_abnormal_close(&mut self) -> ConnectionEvent {
        self.drop_socket();
        match self.fsm.on_abnormal_close() {
            CloseDisposition::Retry(delay) => {
                self.schedule_reconnect(delay);
                ConnectionEvent::Degraded(DegradeReason::Reconnecting)
            }
            CloseDisposition::Fatal => {
                error!("max reconnect attempts reached");
                ConnectionEvent::Fatal("max reconnect attempts exceeded".into())
            }
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        // Single-slot rule: a second timer must never exist.
        if self.reconnect_timer.is_some() {
            warn!("reconnect timer already pending, not scheduling another");
            return;
        }

        let tx = self.socket_tx.clone();
        let generation = self.generation;
        info!(?delay, attempt = self.fsm.attempts(), "scheduling reconnect");
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SocketEvent {
                generation,
                kind: SocketEventKind::ReconnectDue,
            });
        }));
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            debug!("cancelling pending reconnect timer");
            timer.abort();
        }
    }

    fn drop_socket(&mut self) {
        self.write = None;
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        if let Some(task) = self.dial_task.take() {
            task.abort();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }
}
