//! In-memory [`PersistenceSink`] implementation for testing.
//!
//! Uses a `HashMap` per datastore behind `std::sync::RwLock` for thread
//! safety. Also counts put calls so tests can assert on batching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{NormalizedRecord, PutResponse};

use super::{check_put_size, PersistenceSink};

/// In-memory store keyed by datastore name, then `object_id`.
pub struct InMemoryStore {
    datastores: RwLock<HashMap<String, HashMap<Uuid, NormalizedRecord>>>,
    puts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            datastores: RwLock::new(HashMap::new()),
            puts: AtomicUsize::new(0),
        }
    }

    /// Number of records currently held in `datastore`.
    pub fn len(&self, datastore: &str) -> usize {
        self.datastores
            .read()
            .map(|d| d.get(datastore).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, datastore: &str) -> bool {
        self.len(datastore) == 0
    }

    pub fn get(&self, datastore: &str, object_id: &Uuid) -> Option<NormalizedRecord> {
        self.datastores
            .read()
            .ok()?
            .get(datastore)?
            .get(object_id)
            .cloned()
    }

    /// All records in `datastore`, in no particular order.
    pub fn records(&self, datastore: &str) -> Vec<NormalizedRecord> {
        self.datastores
            .read()
            .map(|d| {
                d.get(datastore)
                    .map(|m| m.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of `put` calls received, including rejected ones.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceSink for InMemoryStore {
    async fn put(&self, datastore: &str, items: &[NormalizedRecord]) -> Result<PutResponse> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if let Some(rejected) = check_put_size(items) {
            return Ok(rejected);
        }
        let mut datastores = self
            .datastores
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let table = datastores.entry(datastore.to_string()).or_default();
        for item in items {
            table.insert(item.object_id, item.clone());
        }
        Ok(PutResponse::ok())
    }
}
