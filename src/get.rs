//! Record retrieval by object id (`harvest get`).

use anyhow::{bail, Result};

use crate::config::Config;
use crate::sqlite_store::{SqliteStore, StoredRecord};

pub async fn get_record(config: &Config, object_id: &str) -> Result<StoredRecord> {
    let store = SqliteStore::open(config).await?;
    let record = store.get_record(object_id).await;
    store.close().await;

    match record? {
        Some(r) => Ok(r),
        None => bail!("record not found: {}", object_id),
    }
}

/// CLI entry point: print the record as text, or as JSON with `--json`.
pub async fn run_get(config: &Config, object_id: &str, json: bool) -> Result<()> {
    let record = get_record(config, object_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("--- Record ---");
    println!("object_id:  {}", record.object_id);
    println!("datastore:  {}", record.datastore);
    println!("user:       {}", record.user);
    println!("updated_at: {}", format_ts_iso(record.updated_at));
    println!();

    println!("--- Message ---");
    println!("{}", record.message);

    if let Some(replies) = &record.replies {
        println!();
        println!("--- Replies ({}) ---", replies.lines().count());
        println!("{}", replies);
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
