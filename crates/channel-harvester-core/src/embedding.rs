//! Embedding instances and the embedding sink trait.
//!
//! A batch of [`NormalizedRecord`]s is projected into
//! [`EmbeddingInstance`]s (title = message, content = thread replies or the
//! message itself) and sent to an [`EmbeddingSink`] in a single request.
//! Instances with an empty title or content are never sent.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{EmbedResponse, NormalizedRecord};

/// Task type for documents indexed for retrieval.
pub const RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingInstance {
    pub task_type: String,
    pub title: String,
    pub content: String,
}

/// Request body: `{ "instances": [...] }`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub instances: &'a [EmbeddingInstance],
}

/// Build the embedding instances for a batch, dropping empty ones.
pub fn build_instances(records: &[NormalizedRecord], task_type: &str) -> Vec<EmbeddingInstance> {
    records
        .iter()
        .map(|r| EmbeddingInstance {
            task_type: task_type.to_string(),
            title: r.message.clone(),
            content: r.replies.clone().unwrap_or_else(|| r.message.clone()),
        })
        .filter(|i| !i.title.is_empty() && !i.content.is_empty())
        .collect()
}

/// Downstream service that receives embedding instances.
#[async_trait]
pub trait EmbeddingSink: Send + Sync {
    /// Short identifier used in logs (e.g. `"http"`).
    fn name(&self) -> &str;

    /// Send one batch of instances. `Err` is a transport failure; a non-2xx
    /// answer comes back as `Ok` with `ok == false`.
    async fn embed(&self, instances: &[EmbeddingInstance]) -> Result<EmbedResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(message: &str, replies: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            object_id: Uuid::new_v4(),
            user: "U1".to_string(),
            message: message.to_string(),
            replies: replies.map(str::to_string),
        }
    }

    #[test]
    fn content_prefers_replies() {
        let instances = build_instances(
            &[record("root", Some("root\nanswer")), record("flat", None)],
            RETRIEVAL_DOCUMENT,
        );
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].title, "root");
        assert_eq!(instances[0].content, "root\nanswer");
        assert_eq!(instances[1].content, "flat");
        assert!(instances.iter().all(|i| i.task_type == RETRIEVAL_DOCUMENT));
    }

    #[test]
    fn drops_empty_title_or_content() {
        let instances = build_instances(
            &[
                record("", None),
                record("", Some("orphan replies")),
                record("has title", Some("")),
                record("kept", None),
            ],
            RETRIEVAL_DOCUMENT,
        );
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].title, "kept");
    }

    #[test]
    fn request_serializes_instances_array() {
        let instances = build_instances(&[record("a", None)], RETRIEVAL_DOCUMENT);
        let body = serde_json::to_value(EmbeddingRequest {
            instances: &instances,
        })
        .unwrap();
        assert_eq!(body["instances"][0]["task_type"], "RETRIEVAL_DOCUMENT");
        assert_eq!(body["instances"][0]["title"], "a");
        assert_eq!(body["instances"][0]["content"], "a");
    }
}
