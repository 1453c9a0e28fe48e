//! coedit-core: Runtime-free core for the collaborative document sync client.
//!
//! This crate provides everything that does not need a socket or a clock:
//! - Document/collaborator data model matching the REST wire shape
//! - Permission gate (ownership override + collaborator lookup)
//! - Wire protocol codec for edit frames
//! - Connection state machine with the reconnect/backoff policy
//! - Editor state controller (last-write-wins text, gated write path)
//! - Session status flags (failures surfaced as state, never thrown)
//!
//! The networking half lives in `coedit-client`.

pub mod api;
pub mod connection;
pub mod document;
pub mod editor;
pub mod permission;
pub mod protocol;
pub mod status;

pub use connection::{CloseDisposition, ConnectionFsm, ConnectionState, NORMAL_CLOSE_CODE};
pub use document::{Collaborator, Document, DocumentContent, Permission, User};
pub use editor::{EditRejected, EditorState, LocalEdit};
pub use permission::EffectivePermission;
pub use protocol::{DecodeError, Inbound};
pub use status::SessionStatus;
