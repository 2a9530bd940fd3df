//! Upstream failure taxonomy.
//!
//! Every downstream call (history page, thread replies, channel join,
//! datastore put, embedding POST) that does not succeed is recorded as an
//! [`UpstreamError`]. None of them abort a harvest: the affected page, batch,
//! or record is skipped and the failure is logged and reported.

use std::time::Duration;

/// Operation names used in logs and failure records.
pub mod op {
    pub const HISTORY: &str = "conversations.history";
    pub const REPLIES: &str = "conversations.replies";
    pub const JOIN: &str = "conversations.join";
    pub const STORE_PUT: &str = "datastore.bulk_put";
    pub const EMBED: &str = "embedding.predict";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The collaborator answered but reported failure (`ok: false`, non-2xx).
    #[error("{operation} returned an error: {error}")]
    NotOk {
        operation: &'static str,
        error: String,
    },
    /// The call itself failed (connection, decode, I/O).
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl UpstreamError {
    pub fn not_ok(operation: &'static str, error: Option<&str>) -> Self {
        Self::NotOk {
            operation,
            error: error.unwrap_or("unknown_error").to_string(),
        }
    }

    pub fn transport(operation: &'static str, err: &anyhow::Error) -> Self {
        Self::Transport {
            operation,
            message: format!("{err:#}"),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotOk { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Timeout { operation, .. } => operation,
        }
    }
}
