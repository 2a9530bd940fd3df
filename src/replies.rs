//! Thread reply resolution.
//!
//! For every [`HarvestItem`] whose message has replies, [`ReplyResolver`]
//! fetches the thread and flattens all texts (root included, fetch order)
//! into a newline-joined `replies` string. Items without replies pass
//! through untouched.
//!
//! A batch is resolved as a scatter/gather stage: at most `concurrency`
//! fetches are in flight, results come back in input order, and each task
//! carries its own failure instead of failing the batch. A failed thread
//! fetch leaves the record without `replies`.

use futures::stream::{self, StreamExt};

use channel_harvester_core::messaging::MessagingApi;
use channel_harvester_core::models::{HarvestItem, NormalizedRecord};

use crate::error::{op, UpstreamError};
use crate::policy::CallPolicy;

/// Separator between reply texts in the flattened `replies` field.
pub const REPLY_SEPARATOR: &str = "\n";

/// Outcome of resolving one item.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: NormalizedRecord,
    /// True when a thread fetch was attempted for this item.
    pub attempted: bool,
    pub failure: Option<UpstreamError>,
}

impl Resolution {
    fn untouched(record: NormalizedRecord) -> Self {
        Self {
            record,
            attempted: false,
            failure: None,
        }
    }
}

pub struct ReplyResolver<'a> {
    api: &'a dyn MessagingApi,
    channel: &'a str,
    policy: CallPolicy,
    concurrency: usize,
    max_pages: usize,
}

impl<'a> ReplyResolver<'a> {
    pub fn new(api: &'a dyn MessagingApi, channel: &'a str, policy: CallPolicy) -> Self {
        Self {
            api,
            channel,
            policy,
            concurrency: channel_harvester_core::batch::MAX_BATCH_SIZE,
            max_pages: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Follow reply cursors for up to `max_pages` pages per thread.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Resolve a whole batch, preserving input order.
    pub async fn resolve_batch(&self, items: Vec<HarvestItem>) -> Vec<Resolution> {
        stream::iter(items)
            .map(|item| self.resolve(item))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    pub async fn resolve(&self, item: HarvestItem) -> Resolution {
        let HarvestItem { mut record, thread_ts } = item;
        let Some(thread_ts) = thread_ts else {
            return Resolution::untouched(record);
        };

        match self.fetch_thread(&thread_ts).await {
            Ok(texts) => {
                record.replies = Some(texts.join(REPLY_SEPARATOR));
                Resolution {
                    record,
                    attempted: true,
                    failure: None,
                }
            }
            Err(failure) => {
                tracing::warn!(
                    operation = op::REPLIES,
                    channel = self.channel,
                    thread_ts = %thread_ts,
                    object_id = %record.object_id,
                    error = %failure,
                    "thread fetch failed; keeping record without replies"
                );
                Resolution {
                    record,
                    attempted: true,
                    failure: Some(failure),
                }
            }
        }
    }

    async fn fetch_thread(&self, thread_ts: &str) -> Result<Vec<String>, UpstreamError> {
        let mut texts = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..self.max_pages {
            let resp = self
                .policy
                .run(op::REPLIES, || {
                    self.api
                        .replies(self.channel, thread_ts, cursor.as_deref())
                })
                .await?;
            if !resp.ok {
                return Err(UpstreamError::not_ok(op::REPLIES, resp.error.as_deref()));
            }
            texts.extend(resp.messages.into_iter().map(|m| m.text));
            cursor = resp.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(texts)
    }
}
