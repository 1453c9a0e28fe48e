//! One editing session: one open document view, one connection lifecycle.
//!
//! The session owns exactly one [`ConnectionManager`], created on session
//! start and torn down exactly once on session end (teardown is idempotent).
//! All state transitions are serialized through [`EditSession::poll`] and the
//! edit entry point; no failure propagates out of the event loop, everything
//! lands in [`SessionStatus`].

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use coedit_core::connection::ConnectionState;
use coedit_core::document::Document;
use coedit_core::editor::{EditRejected, EditorState, LocalEdit};
use coedit_core::permission::EffectivePermission;
use coedit_core::protocol::{self, Inbound};
use coedit_core::status::SessionStatus;

use crate::connection::{ConnectionEvent, ConnectionManager, DegradeReason};
use crate::target::ChannelTarget;

// User-facing status strings, matching the surrounding UI's banners.
const MSG_RECONNECTING: &str = "Connection lost. Attempting to reconnect...";
const MSG_TRANSPORT_ERROR: &str = "Connection error occurred. Some changes might not be saved.";
const MSG_FATAL: &str = "Connection lost. Please refresh the page to continue editing.";
const MSG_BAD_FRAME: &str = "Error processing document update";
const MSG_SEND_FAILED: &str = "Failed to send update. Please try again.";
const MSG_NOT_CONNECTED: &str =
    "Not connected. Your changes will not be saved until connection is restored.";

/// Transient warnings dismiss themselves after this long on screen.
const TRANSIENT_DISMISS_AFTER: Duration = Duration::from_secs(5);

/// What changed after processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Remote edit applied; the text changed.
    RemoteChange,
    /// Connection or warning state changed.
    Status,
    /// The connection closed normally; the session is over.
    Ended,
}

/// An editing session for one document view.
pub struct EditSession {
    manager: ConnectionManager,
    editor: EditorState,
    status: SessionStatus,
    /// When the current transient warning auto-dismisses, if one is showing.
    transient_deadline: Option<Instant>,
    torn_down: bool,
}

impl EditSession {
    /// Create a session from a freshly fetched document.
    ///
    /// `user_id` is the authenticated user; `target` carries the channel URL
    /// and credential.
    pub fn new(document: Document, user_id: u64, target: ChannelTarget) -> Self {
        Self {
            manager: ConnectionManager::new(target),
            editor: EditorState::new(document, user_id),
            status: SessionStatus::new(),
            transient_deadline: None,
            torn_down: false,
        }
    }

    /// Open the connection. Safe to call again; open is idempotent. The
    /// outcome surfaces through [`Self::poll`].
    pub fn start(&mut self) {
        self.manager.open();
    }

    /// Process the next connection event, or the expiry of the current
    /// transient warning. Returns `None` when the event stream is exhausted
    /// (manager dropped).
    pub async fn poll(&mut self) -> Option<SessionUpdate> {
        loop {
            let event = if let Some(deadline) = self.transient_deadline {
                tokio::select! {
                    event = self.manager.poll_events() => event?,
                    _ = sleep_until(deadline) => {
                        self.transient_deadline = None;
                        self.status.dismiss_transient();
                        return Some(SessionUpdate::Status);
                    }
                }
            } else {
                self.manager.poll_events().await?
            };

            let update = match event {
                ConnectionEvent::Opened => {
                    self.status.on_opened();
                    self.transient_deadline = None;
                    SessionUpdate::Status
                }
                ConnectionEvent::MessageReceived(data) => match protocol::decode(&data) {
                    Ok(Inbound::Change { text }) => {
                        debug!(len = text.len(), "applying remote change");
                        self.editor.apply_remote(text);
                        SessionUpdate::RemoteChange
                    }
                    Ok(Inbound::Ignored) => continue,
                    Err(e) => {
                        // Transient: discard the frame, keep the connection.
                        warn!("discarding malformed frame: {}", e);
                        self.warn(MSG_BAD_FRAME);
                        SessionUpdate::Status
                    }
                },
                ConnectionEvent::Degraded(reason) => {
                    self.status.on_degraded(match reason {
                        DegradeReason::Reconnecting => MSG_RECONNECTING,
                        DegradeReason::TransportError => MSG_TRANSPORT_ERROR,
                    });
                    SessionUpdate::Status
                }
                ConnectionEvent::Fatal(reason) => {
                    warn!("session is terminal: {}", reason);
                    self.status.on_fatal(MSG_FATAL);
                    SessionUpdate::Status
                }
                ConnectionEvent::Closed => {
                    self.status.on_closed();
                    SessionUpdate::Ended
                }
            };
            return Some(update);
        }
    }

    /// Propose a local edit (the full updated text, one call per keystroke).
    ///
    /// Rejected without side effects when the user has no write access. When
    /// the connection is down the edit applies locally only and a warning is
    /// raised; it will not be resent on reconnect.
    pub async fn edit(&mut self, text: String) -> Result<(), EditRejected> {
        let open = self.manager.state() == ConnectionState::Open;

        match self.editor.propose_local_edit(text, open)? {
            LocalEdit::Send(payload) => {
                if let Err(e) = self.manager.send_raw(&payload).await {
                    warn!("send failed: {}", e);
                    self.warn(MSG_SEND_FAILED);
                }
            }
            LocalEdit::LocalOnly => {
                self.warn(MSG_NOT_CONNECTED);
            }
        }
        Ok(())
    }

    /// Tear the session down: cancel any pending reconnect, then close the
    /// connection with the normal code. Idempotent.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            debug!("teardown already ran");
            return;
        }
        self.torn_down = true;
        info!("tearing down session");
        self.manager.close_intentionally().await;
        self.status.on_closed();
    }

    pub fn text(&self) -> &str {
        self.editor.text()
    }

    pub fn unsynced(&self) -> bool {
        self.editor.unsynced()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Dismiss the transient warning ahead of its auto-dismiss deadline.
    pub fn dismiss_warning(&mut self) {
        self.transient_deadline = None;
        self.status.dismiss_transient();
    }

    /// Raise a transient warning and arm its auto-dismiss deadline.
    fn warn(&mut self, message: &'static str) {
        self.status.warn_transient(message);
        self.transient_deadline = Some(Instant::now() + TRANSIENT_DISMISS_AFTER);
    }

    pub fn effective_permission(&self) -> EffectivePermission {
        self.editor.effective_permission()
    }

    pub fn can_edit(&self) -> bool {
        self.editor.can_edit()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn document(&self) -> &Document {
        self.editor.document()
    }
}
