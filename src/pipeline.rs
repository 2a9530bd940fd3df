//! Harvest orchestration.
//!
//! [`Harvester`] drives one harvest of one channel:
//!
//! ```text
//! join? ──▶ HistoryPaginator ──▶ Normalizer ──▶ Batcher ──▶ ReplyResolver
//!                                                              │
//!                                  ┌───────────────────────────┤
//!                                  ▼                           ▼
//!                          PersistenceSink              EmbeddingSink
//! ```
//!
//! Pages are processed in API order and batches within a page strictly in
//! sequence. For each batch the store is written first, then the embedding
//! sink. Both sinks are optional.
//!
//! No downstream failure aborts a run. A failed page, thread, put, or
//! embedding POST is logged, counted, and appended to
//! [`HarvestReport::failures`], and the harvester moves on to the next unit of
//! work. Even an unexpected error escaping the run is folded into the report.
//! [`Harvester::run`] always answers `completed: false`: completion is
//! signalled later by whoever triggered the harvest.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use channel_harvester_core::batch::Batcher;
use channel_harvester_core::embedding::{build_instances, EmbeddingSink};
use channel_harvester_core::messaging::MessagingApi;
use channel_harvester_core::models::{ApiReply, NormalizedRecord};
use channel_harvester_core::normalize::{IdGenerator, Normalizer};
use channel_harvester_core::store::PersistenceSink;

use crate::config::Config;
use crate::error::{op, UpstreamError};
use crate::paginator::HistoryPaginator;
use crate::policy::Policies;
use crate::progress::{HarvestProgressEvent, HarvestProgressReporter, NoProgress};
use crate::replies::ReplyResolver;

/// Tunables for a harvest, usually taken from `[harvest]` and `[slack]`.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub max_extra_pages: usize,
    pub batch_size: usize,
    pub reply_concurrency: usize,
    pub max_reply_pages: usize,
    pub datastore: String,
    pub task_type: String,
    pub join_before_harvest: bool,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            max_extra_pages: 2,
            batch_size: channel_harvester_core::batch::MAX_BATCH_SIZE,
            reply_concurrency: channel_harvester_core::batch::MAX_BATCH_SIZE,
            max_reply_pages: 1,
            datastore: "SampleObjects".to_string(),
            task_type: channel_harvester_core::embedding::RETRIEVAL_DOCUMENT.to_string(),
            join_before_harvest: false,
        }
    }
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_extra_pages: config.harvest.max_extra_pages,
            batch_size: config.harvest.batch_size,
            reply_concurrency: config.harvest.effective_reply_concurrency(),
            max_reply_pages: config.harvest.max_reply_pages,
            datastore: config.harvest.datastore.clone(),
            task_type: config.embedding.task_type.clone(),
            join_before_harvest: config.slack.join_before_harvest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestState {
    Running,
    /// Terminal for the harvester; completion is signalled externally.
    AwaitingExternalCompletion,
}

impl HarvestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestState::Running => "running",
            HarvestState::AwaitingExternalCompletion => "awaiting_external_completion",
        }
    }
}

/// One skipped unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub operation: String,
    /// What was skipped: `page 2`, `page 1 batch 3`, an object id, a channel.
    pub unit: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// The page ceiling was reached while more history was available.
    pub truncated: bool,
    pub messages: usize,
    pub batches: usize,
    pub replies_resolved: usize,
    pub replies_failed: usize,
    pub store_batches_written: usize,
    pub store_batches_failed: usize,
    pub records_persisted: usize,
    pub embed_batches_sent: usize,
    pub embed_batches_failed: usize,
    /// Batches where every instance was filtered out, so nothing was sent.
    pub embed_batches_skipped: usize,
    pub instances_sent: usize,
    pub failures: Vec<FailureRecord>,
}

impl HarvestReport {
    fn record_failure(&mut self, operation: &str, unit: impl Into<String>, error: impl Into<String>) {
        self.failures.push(FailureRecord {
            operation: operation.to_string(),
            unit: unit.into(),
            error: error.into(),
        });
    }

    fn record_upstream(&mut self, unit: impl Into<String>, err: &UpstreamError) {
        self.record_failure(err.operation(), unit, err.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestOutcome {
    /// Always false.
    pub completed: bool,
    pub state: HarvestState,
    pub report: HarvestReport,
}

/// Unified harvest orchestrator.
pub struct Harvester {
    messaging: Arc<dyn MessagingApi>,
    store: Option<Arc<dyn PersistenceSink>>,
    embedder: Option<Arc<dyn EmbeddingSink>>,
    normalizer: Normalizer,
    options: HarvestOptions,
    policies: Policies,
    progress: Box<dyn HarvestProgressReporter>,
}

impl Harvester {
    pub fn new(
        messaging: Arc<dyn MessagingApi>,
        ids: Arc<dyn IdGenerator>,
        options: HarvestOptions,
    ) -> Self {
        Self {
            messaging,
            store: None,
            embedder: None,
            normalizer: Normalizer::new(ids),
            options,
            policies: Policies::default(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PersistenceSink>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingSink>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn HarvestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Harvest `channel`. Never fails; see the module docs.
    pub async fn run(&self, channel: &str) -> HarvestOutcome {
        let mut report = HarvestReport::default();

        if let Err(e) = self.run_inner(channel, &mut report).await {
            let message = format!("{e:#}");
            tracing::error!(channel, error = %message, "harvest aborted");
            report.record_failure("harvest", channel, message);
        }

        tracing::info!(
            channel,
            pages = report.pages_fetched,
            messages = report.messages,
            batches = report.batches,
            records_persisted = report.records_persisted,
            embed_batches_sent = report.embed_batches_sent,
            failures = report.failures.len(),
            truncated = report.truncated,
            "harvest finished; awaiting external completion"
        );

        HarvestOutcome {
            completed: false,
            state: HarvestState::AwaitingExternalCompletion,
            report,
        }
    }

    async fn run_inner(&self, channel: &str, report: &mut HarvestReport) -> Result<()> {
        if channel.trim().is_empty() {
            bail!("channel must not be empty");
        }
        tracing::info!(channel, state = HarvestState::Running.as_str(), "harvest started");

        if self.options.join_before_harvest {
            self.join(channel, report).await;
        }

        let api = self.messaging.as_ref();
        let mut pages =
            HistoryPaginator::new(api, channel, self.policies.history, self.options.max_extra_pages);
        let resolver = ReplyResolver::new(api, channel, self.policies.replies)
            .with_concurrency(self.options.reply_concurrency)
            .with_max_pages(self.options.max_reply_pages);

        let mut dispatched = 0u64;
        while let Some(page) = pages.next_page().await {
            let page_no = page.index + 1;
            report.pages_fetched += 1;
            if let Some(failure) = &page.failure {
                report.pages_failed += 1;
                report.record_upstream(format!("page {page_no}"), failure);
            }
            report.messages += page.messages.len();
            self.progress.report(HarvestProgressEvent::Paging {
                channel: channel.to_string(),
                page: page_no as u64,
                messages: page.messages.len() as u64,
            });

            let items = self.normalizer.normalize_page(channel, &page.messages);
            let batcher = Batcher::new(items, self.options.batch_size);
            for (batch_idx, batch) in batcher.enumerate() {
                let unit = format!("page {} batch {}", page_no, batch_idx + 1);
                report.batches += 1;

                let mut records = Vec::with_capacity(batch.len());
                for resolution in resolver.resolve_batch(batch).await {
                    if resolution.attempted {
                        match &resolution.failure {
                            Some(failure) => {
                                report.replies_failed += 1;
                                report.record_upstream(
                                    resolution.record.object_id.to_string(),
                                    failure,
                                );
                            }
                            None => report.replies_resolved += 1,
                        }
                    }
                    records.push(resolution.record);
                }

                self.dispatch_store(channel, &unit, &records, report).await;
                self.dispatch_embedding(channel, &unit, &records, report).await;

                dispatched += records.len() as u64;
                self.progress.report(HarvestProgressEvent::Dispatching {
                    channel: channel.to_string(),
                    n: dispatched,
                    total: report.messages as u64,
                });
            }
        }

        report.truncated = pages.truncated();
        if report.truncated {
            tracing::info!(
                channel,
                pages = report.pages_fetched,
                "page ceiling reached; older history left unharvested"
            );
        }
        Ok(())
    }

    async fn join(&self, channel: &str, report: &mut HarvestReport) {
        let api = self.messaging.as_ref();
        let result = self
            .policies
            .join
            .run(op::JOIN, || api.join(channel))
            .await
            .and_then(|r| ensure_ok(op::JOIN, r));
        if let Err(e) = result {
            tracing::warn!(operation = op::JOIN, channel, error = %e, "join failed; harvesting anyway");
            report.record_upstream(channel, &e);
        }
    }

    async fn dispatch_store(
        &self,
        channel: &str,
        unit: &str,
        records: &[NormalizedRecord],
        report: &mut HarvestReport,
    ) {
        let Some(store) = &self.store else {
            return;
        };
        let datastore = self.options.datastore.as_str();
        let result = self
            .policies
            .store
            .run(op::STORE_PUT, || store.put(datastore, records))
            .await
            .and_then(|r| ensure_ok(op::STORE_PUT, r));

        match result {
            Ok(_) => {
                report.store_batches_written += 1;
                report.records_persisted += records.len();
            }
            Err(e) => {
                tracing::warn!(
                    operation = op::STORE_PUT,
                    channel,
                    datastore,
                    unit,
                    items = records.len(),
                    error = %e,
                    "store batch failed"
                );
                report.store_batches_failed += 1;
                report.record_upstream(unit, &e);
            }
        }
    }

    async fn dispatch_embedding(
        &self,
        channel: &str,
        unit: &str,
        records: &[NormalizedRecord],
        report: &mut HarvestReport,
    ) {
        let Some(embedder) = &self.embedder else {
            return;
        };
        let instances = build_instances(records, &self.options.task_type);
        if instances.is_empty() {
            tracing::debug!(channel, unit, "no embeddable records in batch; skipping");
            report.embed_batches_skipped += 1;
            return;
        }

        let result = self
            .policies
            .embed
            .run(op::EMBED, || embedder.embed(&instances))
            .await
            .and_then(|r| ensure_ok(op::EMBED, r));

        match result {
            Ok(_) => {
                report.embed_batches_sent += 1;
                report.instances_sent += instances.len();
            }
            Err(e) => {
                tracing::warn!(
                    operation = op::EMBED,
                    sink = embedder.name(),
                    channel,
                    unit,
                    instances = instances.len(),
                    error = %e,
                    "embedding batch failed"
                );
                report.embed_batches_failed += 1;
                report.record_upstream(unit, &e);
            }
        }
    }
}

fn ensure_ok<T: ApiReply>(operation: &'static str, reply: T) -> Result<T, UpstreamError> {
    if reply.is_ok() {
        Ok(reply)
    } else {
        Err(UpstreamError::not_ok(operation, reply.error()))
    }
}
