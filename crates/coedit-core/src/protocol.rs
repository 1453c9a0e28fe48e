//! Wire protocol for edit frames.
//!
//! Frames are UTF-8 JSON. Outbound edits carry the full document snapshot:
//! `{"content":{"text":...}}`. Inbound changes arrive as
//! `{"type":"change","content":{"text":...}}`. There are no sequence numbers
//! or timestamps; transport delivery order is the authoritative order.
//!
//! A malformed frame is a transient, recoverable condition: the caller logs
//! it, discards the frame, and keeps the connection open.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("change frame is missing content")]
    MissingContent,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Full-document replacement from another collaborator.
    Change { text: String },
    /// A well-formed frame of a type this client does not act on.
    Ignored,
}

#[derive(Serialize)]
struct EditFrame<'a> {
    content: ContentRef<'a>,
}

#[derive(Serialize)]
struct ContentRef<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    content: Option<InboundContent>,
}

#[derive(Deserialize)]
struct InboundContent {
    text: String,
}

/// Encode a local edit as an outbound frame (UTF-8 JSON bytes).
pub fn encode_edit(text: &str) -> Vec<u8> {
    serde_json::to_vec(&EditFrame { content: ContentRef { text } })
        .expect("edit frame serialization should not fail")
}

/// Decode an inbound frame.
///
/// Frames whose envelope is valid but whose type is not `change` decode to
/// [`Inbound::Ignored`]; any parse failure or shape mismatch is a
/// [`DecodeError`].
pub fn decode(data: &[u8]) -> Result<Inbound, DecodeError> {
    let frame: InboundFrame = serde_json::from_slice(data)?;
    if frame.kind != "change" {
        return Ok(Inbound::Ignored);
    }
    let content = frame.content.ok_or(DecodeError::MissingContent)?;
    Ok(Inbound::Change { text: content.text })
}
