//! Channel target: the URL of a document's live-edit channel.
//!
//! Built from a base server URL, a document id, and an explicit bearer token.
//! The token is a parameter here on purpose; the client never reads
//! credentials from ambient process state.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("server URL scheme must be ws or wss, got {0}")]
    BadScheme(String),
}

/// URL of one document's live-edit channel, credential included.
#[derive(Debug, Clone)]
pub struct ChannelTarget {
    url: Url,
}

impl ChannelTarget {
    /// Build the channel URL: `{base}/ws/document/{id}/?token={token}`.
    pub fn new(base: &Url, document_id: u64, token: &str) -> Result<Self, TargetError> {
        match base.scheme() {
            "ws" | "wss" => {}
            other => return Err(TargetError::BadScheme(other.to_string())),
        }

        let mut url = base.clone();
        url.set_path(&format!("/ws/document/{document_id}/"));
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_document_channel_url() {
        let base = Url::parse("ws://localhost:8000").unwrap();
        let target = ChannelTarget::new(&base, 42, "abc123").unwrap();
        assert_eq!(target.as_str(), "ws://localhost:8000/ws/document/42/?token=abc123");
    }

    #[test]
    fn test_token_is_percent_encoded() {
        let base = Url::parse("wss://docs.example.com").unwrap();
        let target = ChannelTarget::new(&base, 1, "a b&c").unwrap();
        assert!(target.as_str().contains("token=a+b%26c"));
    }

    #[test]
    fn test_rejects_http_scheme() {
        let base = Url::parse("http://localhost:8000").unwrap();
        assert!(matches!(
            ChannelTarget::new(&base, 1, "t"),
            Err(TargetError::BadScheme(_))
        ));
    }
}
