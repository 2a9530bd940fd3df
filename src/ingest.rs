//! `harvest run`: wire the configured collaborators into a [`Harvester`].
//!
//! Builds the Slack client, the SQLite store, the embedding sink, the
//! identifier strategy and the call policies from config, runs one harvest,
//! records it in the `runs` table, and prints a summary on stdout.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;

use channel_harvester_core::normalize::{IdGenerator, RandomIds, StableIds};

use crate::config::Config;
use crate::embedding;
use crate::pipeline::{HarvestOptions, HarvestOutcome, Harvester};
use crate::policy::Policies;
use crate::progress::ProgressMode;
use crate::slack::SlackClient;
use crate::sqlite_store::SqliteStore;

/// Command-line switches for `harvest run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Fetch and batch only. Nothing is written or embedded.
    pub dry_run: bool,
    pub no_store: bool,
    pub no_embed: bool,
}

pub fn id_generator(strategy: &str) -> Result<Arc<dyn IdGenerator>> {
    match strategy {
        "random" => Ok(Arc::new(RandomIds)),
        "stable" => Ok(Arc::new(StableIds)),
        other => bail!("Unknown id strategy: '{}'. Must be random or stable.", other),
    }
}

pub async fn run_harvest(
    config: &Config,
    channel: &str,
    flags: RunFlags,
    progress: ProgressMode,
) -> Result<()> {
    let slack = SlackClient::from_config(&config.slack)?;
    let ids = id_generator(&config.harvest.id_strategy)?;

    let mut harvester = Harvester::new(Arc::new(slack), ids, HarvestOptions::from_config(config))
        .with_policies(Policies::from_config(&config.policy))
        .with_progress(progress.reporter());

    let store = if flags.dry_run {
        None
    } else {
        Some(Arc::new(SqliteStore::open(config).await?))
    };

    let persist = config.harvest.persist && !flags.no_store;
    if let (Some(store), true) = (&store, persist) {
        harvester = harvester.with_store(store.clone());
    }
    if !flags.dry_run && !flags.no_embed && config.embedding.is_enabled() {
        if let Some(sink) = embedding::create_sink(&config.embedding)? {
            harvester = harvester.with_embedder(sink);
        }
    }

    let started_at = Utc::now();
    let outcome = harvester.run(channel).await;

    if let Some(store) = &store {
        let run_id = store.record_run(channel, started_at, &outcome).await?;
        tracing::debug!(run_id = %run_id, channel, "run recorded");
        store.close().await;
    }

    print_summary(channel, flags, &outcome);
    Ok(())
}

fn print_summary(channel: &str, flags: RunFlags, outcome: &HarvestOutcome) {
    let r = &outcome.report;
    if flags.dry_run {
        println!("harvest {} (dry-run)", channel);
    } else {
        println!("harvest {}", channel);
    }
    println!("  pages fetched: {}", r.pages_fetched);
    if r.truncated {
        println!("  page limit reached: older history not harvested");
    }
    println!("  messages: {}", r.messages);
    println!("  batches: {}", r.batches);
    println!(
        "  threads resolved: {} ({} failed)",
        r.replies_resolved, r.replies_failed
    );
    if !flags.dry_run {
        println!(
            "  store batches written: {} ({} failed)",
            r.store_batches_written, r.store_batches_failed
        );
        println!("  records persisted: {}", r.records_persisted);
        println!(
            "  embedding batches sent: {} ({} failed, {} skipped)",
            r.embed_batches_sent, r.embed_batches_failed, r.embed_batches_skipped
        );
    }
    println!("  failures: {}", r.failures.len());
    for f in &r.failures {
        println!("    {} [{}]: {}", f.operation, f.unit, f.error);
    }
    println!("  state: {}", outcome.state.as_str());
    println!("completed: {}", outcome.completed);
}
