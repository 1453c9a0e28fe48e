//! coedit-client: WebSocket networking for the collaborative document
//! sync client.
//!
//! Wraps the runtime-free state machines from `coedit-core` in a tokio
//! connection manager and a session object. One session = one open document
//! view = one connection lifecycle.

pub mod connection;
pub mod session;
pub mod target;

pub use connection::{ConnectionEvent, ConnectionManager, DegradeReason, SendError};
pub use session::{EditSession, SessionUpdate};
pub use target::{ChannelTarget, TargetError};
