//! Permission gate: effective access level for the current user.
//!
//! Ownership overrides everything, including a stale collaborator entry for
//! the owner's own id. A user with neither ownership nor a collaborator entry
//! has no access at all; upstream access control should prevent that case,
//! but the gate never assumes it.

use crate::document::{Document, Permission};

/// The access level computed for a user against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectivePermission {
    /// The user owns the document: full rights.
    Owner,
    /// The user appears in the collaborator list with this permission.
    Collaborator(Permission),
    /// No ownership and no collaborator entry.
    None,
}

impl EffectivePermission {
    /// Whether local edits may be sent (owner, EDIT, or ADMIN).
    pub fn has_write_access(&self) -> bool {
        match self {
            EffectivePermission::Owner => true,
            EffectivePermission::Collaborator(p) => *p != Permission::View,
            EffectivePermission::None => false,
        }
    }

    /// Whether the collaborator list may be managed (owner or ADMIN).
    pub fn has_manage_access(&self) -> bool {
        matches!(
            self,
            EffectivePermission::Owner | EffectivePermission::Collaborator(Permission::Admin)
        )
    }
}

/// Compute the effective permission of `user_id` on `document`.
pub fn effective_permission(document: &Document, user_id: u64) -> EffectivePermission {
    if document.owner.id == user_id {
        return EffectivePermission::Owner;
    }
    match document.collaborator_for(user_id) {
        Some(entry) => EffectivePermission::Collaborator(entry.permission),
        None => EffectivePermission::None,
    }
}
