//! Core data models used throughout Channel Harvester.
//!
//! These types represent the raw channel messages, normalized records, and
//! collaborator responses that flow through the harvesting pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A channel message as returned by the messaging API.
///
/// Bot and system messages may omit `user` or `text`, so both default to
/// absent/empty rather than failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
}

impl RawMessage {
    /// Timestamp addressing this message's thread.
    ///
    /// Falls back to the message's own `ts` when the API omitted `thread_ts`
    /// (a thread root is addressed by its own timestamp).
    pub fn thread_key(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// A harvested message in the shape written to the persistence sink.
///
/// `object_id` is the upsert key. `replies` is only present for messages
/// whose thread was fetched successfully.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NormalizedRecord {
    pub object_id: Uuid,
    pub user: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<String>,
}

/// A normalized record that has not been through reply resolution yet.
///
/// `thread_ts` is `Some` exactly when the source message reported replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestItem {
    pub record: NormalizedRecord,
    pub thread_ts: Option<String>,
}

impl HarvestItem {
    pub fn needs_replies(&self) -> bool {
        self.thread_ts.is_some()
    }
}

/// Uniform success check over every collaborator response.
///
/// Call policies retry on `is_ok() == false`, and failure logs use
/// [`error`](ApiReply::error) as the payload.
pub trait ApiReply {
    fn is_ok(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

/// Response of `history` and `replies` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagesResponse {
    pub ok: bool,
    pub messages: Vec<RawMessage>,
    pub next_cursor: Option<String>,
    pub error: Option<String>,
}

impl MessagesResponse {
    pub fn ok(messages: Vec<RawMessage>, next_cursor: Option<String>) -> Self {
        Self {
            ok: true,
            messages,
            next_cursor,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            messages: Vec::new(),
            next_cursor: None,
            error: Some(error.into()),
        }
    }
}

impl ApiReply for MessagesResponse {
    fn is_ok(&self) -> bool {
        self.ok
    }
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Response of a `join` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinResponse {
    pub ok: bool,
    pub error: Option<String>,
}

impl ApiReply for JoinResponse {
    fn is_ok(&self) -> bool {
        self.ok
    }
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Response of a persistence sink bulk put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResponse {
    pub ok: bool,
    pub error: Option<String>,
}

impl PutResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

impl ApiReply for PutResponse {
    fn is_ok(&self) -> bool {
        self.ok
    }
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Response of an embedding sink call. `body` is the raw response text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedResponse {
    pub ok: bool,
    pub status: u16,
    pub body: String,
}

impl ApiReply for EmbedResponse {
    fn is_ok(&self) -> bool {
        self.ok
    }
    fn error(&self) -> Option<&str> {
        if self.ok {
            None
        } else {
            Some(&self.body)
        }
    }
}
