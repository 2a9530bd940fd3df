//! Messaging API abstraction.
//!
//! The pipeline only needs three calls from the chat platform: paginated
//! channel history, a thread's replies, and joining a channel. Transport
//! failures surface as `Err`; API-level failures come back as a response
//! with `ok == false` so callers can still read a partial cursor.

pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{JoinResponse, MessagesResponse};

#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// One page of channel history, newest first. `cursor` is `None` for the
    /// first page.
    async fn history(&self, channel: &str, cursor: Option<&str>) -> Result<MessagesResponse>;

    /// One page of a thread, root message first.
    async fn replies(
        &self,
        channel: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<MessagesResponse>;

    async fn join(&self, channel: &str) -> Result<JoinResponse>;
}
