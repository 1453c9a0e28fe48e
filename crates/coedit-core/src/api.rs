//! Request payload shapes for the surrounding REST API.
//!
//! The sync core never calls these endpoints itself; the surrounding UI owns
//! the HTTP transport. The shapes are modeled here so the collaborator and
//! document entities stay in lockstep with what the server serves:
//!
//! - `GET  /documents/{id}/` and `GET /documents/{id}/collaborators/`
//! - `POST /documents/{id}/add_collaborator/`
//! - `POST /documents/{id}/remove_collaborator/`
//! - `PATCH /documents/{id}/` (out-of-band saves)

use serde::{Deserialize, Serialize};

use crate::document::{DocumentContent, Permission};

/// Body of `POST /documents/{id}/add_collaborator/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCollaboratorRequest {
    pub username: String,
    pub permission: Permission,
}

/// Body of `POST /documents/{id}/remove_collaborator/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCollaboratorRequest {
    pub username: String,
}

/// Body of `PATCH /documents/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    pub content: DocumentContent,
}
