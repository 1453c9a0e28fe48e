//! Editor state controller: the authoritative local view of document text.
//!
//! Remote updates overwrite local text unconditionally (last-write-wins; the
//! most recently received message always wins, no merge). Local edits pass
//! through the permission gate, then either produce an outbound snapshot
//! frame (connection open) or apply locally only with the `unsynced` flag set
//! (connection down). Edits made while disconnected are never retransmitted
//! on reconnect.

use thiserror::Error;

use crate::document::Document;
use crate::permission::{self, EffectivePermission};
use crate::protocol;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditRejected {
    #[error("user has no write permission on this document")]
    NoPermission,
}

/// What the caller should do with an accepted local edit.
#[derive(Debug, PartialEq, Eq)]
pub enum LocalEdit {
    /// Send this frame (full-document snapshot) over the connection.
    Send(Vec<u8>),
    /// Connection down: applied locally only, nothing to send.
    LocalOnly,
}

/// Per-session editor state.
pub struct EditorState {
    document: Document,
    user_id: u64,
    text: String,
    unsynced: bool,
}

impl EditorState {
    /// Start a session from a freshly fetched document.
    pub fn new(document: Document, user_id: u64) -> Self {
        let text = document.content.text.clone();
        Self { document, user_id, text, unsynced: false }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True once an edit was applied locally without reaching the server.
    ///
    /// Sticky: there is no resend path, so the flag only clears with a fresh
    /// session.
    pub fn unsynced(&self) -> bool {
        self.unsynced
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Effective permission of the session user, recomputed against the
    /// cached document on every call.
    pub fn effective_permission(&self) -> EffectivePermission {
        permission::effective_permission(&self.document, self.user_id)
    }

    pub fn can_edit(&self) -> bool {
        self.effective_permission().has_write_access()
    }

    /// Apply a remote change: unconditional overwrite.
    pub fn apply_remote(&mut self, text: String) {
        self.text = text;
    }

    /// Propose a local edit.
    ///
    /// The permission check runs first; a rejected edit leaves the text
    /// untouched and produces no outbound frame. The UI normally disables
    /// input for VIEW users, so rejection here is a defensive backstop.
    pub fn propose_local_edit(
        &mut self,
        text: String,
        connection_open: bool,
    ) -> Result<LocalEdit, EditRejected> {
        if !self.can_edit() {
            return Err(EditRejected::NoPermission);
        }

        self.text = text;

        if connection_open {
            Ok(LocalEdit::Send(protocol::encode_edit(&self.text)))
        } else {
            self.unsynced = true;
            Ok(LocalEdit::LocalOnly)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Collaborator, DocumentContent, Permission, User};

    fn document(owner_id: u64, collaborators: Vec<Collaborator>) -> Document {
        Document {
            id: 1,
            title: "t".into(),
            content: DocumentContent { text: "initial".into() },
            owner: User { id: owner_id, username: "owner".into() },
            collaborators,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn viewer(user_id: u64) -> Collaborator {
        Collaborator {
            id: 1,
            user: User { id: user_id, username: "viewer".into() },
            permission: Permission::View,
        }
    }

    #[test]
    fn test_starts_from_fetched_text() {
        let editor = EditorState::new(document(1, vec![]), 1);
        assert_eq!(editor.text(), "initial");
        assert!(!editor.unsynced());
    }

    #[test]
    fn test_apply_remote_last_write_wins() {
        let mut editor = EditorState::new(document(1, vec![]), 1);
        editor.apply_remote("A".into());
        editor.apply_remote("B".into());
        assert_eq!(editor.text(), "B");
    }

    #[test]
    fn test_remote_overwrites_local_edits() {
        // No merge: a remote update fully replaces whatever is local.
        let mut editor = EditorState::new(document(1, vec![]), 1);
        editor.propose_local_edit("local draft".into(), true).unwrap();
        editor.apply_remote("remote".into());
        assert_eq!(editor.text(), "remote");
    }

    #[test]
    fn test_edit_while_open_sends_snapshot() {
        let mut editor = EditorState::new(document(1, vec![]), 1);
        let edit = editor.propose_local_edit("hello".into(), true).unwrap();
        match edit {
            LocalEdit::Send(payload) => {
                let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
                assert_eq!(value["content"]["text"], "hello");
            }
            LocalEdit::LocalOnly => panic!("expected a frame to send"),
        }
        assert_eq!(editor.text(), "hello");
        assert!(!editor.unsynced());
    }

    #[test]
    fn test_edit_while_disconnected_is_local_only() {
        let mut editor = EditorState::new(document(1, vec![]), 1);
        let edit = editor.propose_local_edit("offline edit".into(), false).unwrap();
        assert_eq!(edit, LocalEdit::LocalOnly);
        assert_eq!(editor.text(), "offline edit");
        assert!(editor.unsynced());
    }

    #[test]
    fn test_unsynced_flag_is_sticky() {
        let mut editor = EditorState::new(document(1, vec![]), 1);
        editor.propose_local_edit("offline".into(), false).unwrap();
        // Connection recovered; there is no resend, so the flag stays.
        editor.propose_local_edit("online again".into(), true).unwrap();
        assert!(editor.unsynced());
    }

    #[test]
    fn test_view_user_edit_rejected() {
        let mut editor = EditorState::new(document(1, vec![viewer(2)]), 2);
        let result = editor.propose_local_edit("nope".into(), true);
        assert_eq!(result, Err(EditRejected::NoPermission));
        // Text untouched, nothing sent.
        assert_eq!(editor.text(), "initial");
    }

    #[test]
    fn test_unknown_user_edit_rejected() {
        let mut editor = EditorState::new(document(1, vec![]), 99);
        assert_eq!(
            editor.propose_local_edit("nope".into(), true),
            Err(EditRejected::NoPermission)
        );
    }
}
