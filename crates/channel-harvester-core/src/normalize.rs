//! Message normalization.
//!
//! Turns a [`RawMessage`] into a [`HarvestItem`]: author and text are copied
//! verbatim and a fresh `object_id` is drawn from an injected
//! [`IdGenerator`]. No content validation happens here; empty texts are
//! filtered at the embedding boundary.
//!
//! # Identifier strategies
//!
//! | Generator | `object_id` | Use |
//! |-----------|-------------|-----|
//! | [`RandomIds`] | random v4 UUID | default, one identity per harvested message per run |
//! | [`StableIds`] | SHA-256 of `(channel, ts)` | re-runs overwrite instead of duplicating |
//! | [`SequentialIds`] | counter | deterministic tests |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{HarvestItem, NormalizedRecord, RawMessage};

/// Source of record identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, channel: &str, message: &RawMessage) -> Uuid;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self, _channel: &str, _message: &RawMessage) -> Uuid {
        Uuid::new_v4()
    }
}

/// Content-addressed identifiers derived from the channel and message `ts`.
///
/// Slack guarantees `ts` is unique within a channel, so the pair identifies
/// a message across runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct StableIds;

impl IdGenerator for StableIds {
    fn next_id(&self, channel: &str, message: &RawMessage) -> Uuid {
        let mut hasher = Sha256::new();
        hasher.update(channel.as_bytes());
        hasher.update([0u8]);
        hasher.update(message.ts.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Uuid::from_bytes(bytes)
    }
}

/// Counter-backed identifiers: `00000000-0000-0000-0000-000000000001`, `…002`, …
///
/// Two fresh instances hand out the same sequence, which makes them suitable
/// for pinned-identifier tests.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, _channel: &str, _message: &RawMessage) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}

/// Maps raw channel messages to harvest items.
#[derive(Clone)]
pub struct Normalizer {
    ids: Arc<dyn IdGenerator>,
}

impl Normalizer {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    pub fn normalize(&self, channel: &str, message: &RawMessage) -> HarvestItem {
        let record = NormalizedRecord {
            object_id: self.ids.next_id(channel, message),
            user: message.user.clone().unwrap_or_default(),
            message: message.text.clone(),
            replies: None,
        };
        let thread_ts = if message.reply_count > 0 {
            Some(message.thread_key().to_string())
        } else {
            None
        };
        HarvestItem { record, thread_ts }
    }

    pub fn normalize_page(&self, channel: &str, messages: &[RawMessage]) -> Vec<HarvestItem> {
        messages
            .iter()
            .map(|m| self.normalize(channel, m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn msg(ts: &str, text: &str, reply_count: u32) -> RawMessage {
        RawMessage {
            user: Some("U123".to_string()),
            text: text.to_string(),
            ts: ts.to_string(),
            thread_ts: if reply_count > 0 {
                Some(ts.to_string())
            } else {
                None
            },
            reply_count,
        }
    }

    #[test]
    fn copies_author_and_text() {
        let normalizer = Normalizer::new(Arc::new(RandomIds));
        let item = normalizer.normalize("C1", &msg("1.0", "deploy is green", 0));
        assert_eq!(item.record.user, "U123");
        assert_eq!(item.record.message, "deploy is green");
        assert_eq!(item.record.replies, None);
        assert!(!item.needs_replies());
    }

    #[test]
    fn threaded_message_carries_thread_ts() {
        let normalizer = Normalizer::new(Arc::new(RandomIds));
        let item = normalizer.normalize("C1", &msg("2.0", "question?", 3));
        assert_eq!(item.thread_ts.as_deref(), Some("2.0"));
    }

    #[test]
    fn missing_user_becomes_empty() {
        let normalizer = Normalizer::new(Arc::new(RandomIds));
        let raw = RawMessage {
            user: None,
            text: "bot says hi".to_string(),
            ts: "3.0".to_string(),
            ..Default::default()
        };
        assert_eq!(normalizer.normalize("C1", &raw).record.user, "");
    }

    #[test]
    fn random_ids_are_unique() {
        let normalizer = Normalizer::new(Arc::new(RandomIds));
        let messages: Vec<RawMessage> = (0..500).map(|i| msg(&format!("{i}.0"), "x", 0)).collect();
        let ids: HashSet<Uuid> = normalizer
            .normalize_page("C1", &messages)
            .into_iter()
            .map(|i| i.record.object_id)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn stable_ids_repeat_per_channel_and_ts() {
        let a = StableIds.next_id("C1", &msg("1.0", "x", 0));
        let b = StableIds.next_id("C1", &msg("1.0", "edited", 0));
        let c = StableIds.next_id("C2", &msg("1.0", "x", 0));
        let d = StableIds.next_id("C1", &msg("1.1", "x", 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn sequential_ids_restart_per_instance() {
        let first = SequentialIds::new();
        let second = SequentialIds::new();
        let m = msg("1.0", "x", 0);
        assert_eq!(first.next_id("C1", &m), Uuid::from_u128(1));
        assert_eq!(first.next_id("C1", &m), Uuid::from_u128(2));
        assert_eq!(second.next_id("C1", &m), Uuid::from_u128(1));
    }
}
