//! Persistence sink abstraction for Channel Harvester.
//!
//! The [`PersistenceSink`] trait is the bulk-upsert interface the pipeline
//! writes batches to, enabling pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::batch::MAX_BATCH_SIZE;
use crate::models::{NormalizedRecord, PutResponse};

/// Error code returned when a put exceeds [`MAX_BATCH_SIZE`] items.
pub const TOO_MANY_ITEMS: &str = "too_many_items";

/// Durable destination for normalized records.
///
/// # Contract
///
/// - [`put`](PersistenceSink::put) upserts every item keyed by `object_id`:
///   writing the same identifier twice overwrites, never duplicates.
/// - A call with more than [`MAX_BATCH_SIZE`] items is rejected with
///   `ok == false` and `error == TOO_MANY_ITEMS`, and writes nothing.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn put(&self, datastore: &str, items: &[NormalizedRecord]) -> Result<PutResponse>;
}

/// Shared size check for sink implementations.
pub fn check_put_size(items: &[NormalizedRecord]) -> Option<PutResponse> {
    if items.len() > MAX_BATCH_SIZE {
        Some(PutResponse::failed(TOO_MANY_ITEMS))
    } else {
        None
    }
}
