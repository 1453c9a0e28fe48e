//! Document and collaborator data model.
//!
//! Field names are pinned to the REST wire shape (`GET /documents/{id}/`)
//! so permission computation sees exactly what the server sends. The client
//! holds a cached, possibly stale copy; `content.text` is the only field the
//! sync core mutates.

use serde::{Deserialize, Serialize};

/// Access level of a collaborator entry. Closed enum.
///
/// ADMIN implies management rights, EDIT implies write rights, VIEW implies
/// neither. This is not a strict ordering beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    View,
    Edit,
    Admin,
}

/// A user as embedded in document payloads.
///
/// The backend also sends `email`; unknown fields are ignored on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
}

/// A collaborator entry on a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: u64,
    pub user: User,
    pub permission: Permission,
}

/// The document body. Wrapped in an object on the wire (`{"text": ...}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub text: String,
}

/// A shared document as returned by `GET /documents/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub content: DocumentContent,
    pub owner: User,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    /// Look up the collaborator entry for a user, if any.
    pub fn collaborator_for(&self, user_id: u64) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.user.id == user_id)
    }
}
