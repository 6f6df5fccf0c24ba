//! Error types for the token feed core
//!
//! None of these reach the read API: the connector turns them into
//! reconnect decisions, the poller logs and skips the cycle, and the
//! enricher drops them.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the feed producers.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("websocket connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl FeedError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::InvalidUrl { .. } => "invalid_url",
            FeedError::Connect(_) => "connect",
            FeedError::Transport(_) => "transport",
            FeedError::Http(_) => "http",
            FeedError::Status { .. } => "status",
            FeedError::Decode(_) => "decode",
            FeedError::Timeout(_) => "timeout",
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Decode(e.to_string())
    }
}
