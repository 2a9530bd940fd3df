//! Database statistics (`harvest stats`).
//!
//! Summarizes what has been harvested: record counts per datastore and the
//! most recent runs with their failure counts.

use anyhow::Result;

use crate::config::Config;
use crate::progress::format_number;
use crate::sqlite_store::SqliteStore;

const RECENT_RUNS: i64 = 10;

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let counts = store.count_records().await;
    let runs = store.recent_runs(RECENT_RUNS).await;
    store.close().await;
    let (counts, runs) = (counts?, runs?);

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    println!("Channel Harvester — Database Stats");
    println!("==================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", format_number(total as u64));

    if !counts.is_empty() {
        println!();
        println!("  By datastore:");
        println!("  {:<32} {:>10}", "DATASTORE", "RECORDS");
        println!("  {}", "-".repeat(43));
        for (datastore, n) in &counts {
            println!("  {:<32} {:>10}", datastore, format_number(*n as u64));
        }
    }

    println!();
    if runs.is_empty() {
        println!("  No harvest runs recorded.");
    } else {
        println!("  Recent runs:");
        println!(
            "  {:<16} {:>5} {:>8} {:>9} {:>8}   {}",
            "CHANNEL", "PAGES", "MESSAGES", "PERSISTED", "FAILURES", "FINISHED"
        );
        println!("  {}", "-".repeat(76));
        for run in &runs {
            println!(
                "  {:<16} {:>5} {:>8} {:>9} {:>8}   {}",
                run.channel,
                run.pages_fetched,
                run.messages,
                run.records_persisted,
                run.failures,
                format_ts_relative(run.finished_at)
            );
        }
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn recent_timestamps_are_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
