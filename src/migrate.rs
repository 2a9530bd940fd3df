//! Schema migrations.
//!
//! Every statement is idempotent, so `harvest init` can be re-run safely and
//! the store applies the schema again when it opens.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Harvested records, upserted by object_id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            object_id TEXT PRIMARY KEY,
            datastore TEXT NOT NULL,
            user TEXT NOT NULL,
            message TEXT NOT NULL,
            replies TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per harvest run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id TEXT PRIMARY KEY,
            channel TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            state TEXT NOT NULL,
            pages_fetched INTEGER NOT NULL,
            messages INTEGER NOT NULL,
            records_persisted INTEGER NOT NULL,
            failures INTEGER NOT NULL,
            report_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_datastore ON records(datastore)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_finished_at ON runs(finished_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
