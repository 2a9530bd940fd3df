//! Channel history pagination.
//!
//! [`HistoryPaginator`] walks a channel's history one page at a time. It is
//! lazy (nothing is fetched until [`next_page`](HistoryPaginator::next_page)
//! is awaited) and bounded: at most `1 + max_extra_pages` requests are made.
//!
//! A page whose response is not ok yields no messages. Pagination carries on
//! only if that failed response still held a cursor. A transport failure
//! ends pagination.

use channel_harvester_core::messaging::MessagingApi;
use channel_harvester_core::models::RawMessage;

use crate::error::{op, UpstreamError};
use crate::policy::CallPolicy;

/// One page of channel history.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Zero-based position of this page in the walk.
    pub index: usize,
    pub messages: Vec<RawMessage>,
    /// Set when the page could not be fetched; `messages` is then empty.
    pub failure: Option<UpstreamError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Start,
    Cursor(String),
    Done,
}

pub struct HistoryPaginator<'a> {
    api: &'a dyn MessagingApi,
    channel: &'a str,
    policy: CallPolicy,
    max_pages: usize,
    fetched: usize,
    position: Position,
}

impl<'a> HistoryPaginator<'a> {
    pub fn new(
        api: &'a dyn MessagingApi,
        channel: &'a str,
        policy: CallPolicy,
        max_extra_pages: usize,
    ) -> Self {
        Self {
            api,
            channel,
            policy,
            max_pages: max_extra_pages + 1,
            fetched: 0,
            position: Position::Start,
        }
    }

    /// Number of page requests made so far.
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// True once the ceiling was hit while the API still offered a cursor.
    pub fn truncated(&self) -> bool {
        self.fetched >= self.max_pages && matches!(self.position, Position::Cursor(_))
    }

    pub async fn next_page(&mut self) -> Option<HistoryPage> {
        if self.fetched >= self.max_pages {
            return None;
        }
        let cursor = match &self.position {
            Position::Done => return None,
            Position::Start => None,
            Position::Cursor(c) => Some(c.clone()),
        };

        let index = self.fetched;
        self.fetched += 1;

        let api = self.api;
        let channel = self.channel;
        let result = self
            .policy
            .run(op::HISTORY, || api.history(channel, cursor.as_deref()))
            .await;

        match result {
            Ok(resp) if resp.ok => {
                self.position = next_position(resp.next_cursor);
                Some(HistoryPage {
                    index,
                    messages: resp.messages,
                    failure: None,
                })
            }
            Ok(resp) => {
                let failure = UpstreamError::not_ok(op::HISTORY, resp.error.as_deref());
                tracing::warn!(
                    operation = op::HISTORY,
                    channel,
                    page = index,
                    error = resp.error.as_deref().unwrap_or("unknown_error"),
                    continues = resp.next_cursor.is_some(),
                    "history page failed"
                );
                self.position = next_position(resp.next_cursor);
                Some(HistoryPage {
                    index,
                    messages: Vec::new(),
                    failure: Some(failure),
                })
            }
            Err(e) => {
                tracing::warn!(
                    operation = op::HISTORY,
                    channel,
                    page = index,
                    error = %e,
                    "history page failed"
                );
                self.position = Position::Done;
                Some(HistoryPage {
                    index,
                    messages: Vec::new(),
                    failure: Some(e),
                })
            }
        }
    }
}

fn next_position(cursor: Option<String>) -> Position {
    match cursor {
        Some(c) if !c.is_empty() => Position::Cursor(c),
        _ => Position::Done,
    }
}
