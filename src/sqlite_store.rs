//! SQLite-backed persistence sink.
//!
//! [`SqliteStore`] implements [`PersistenceSink`] over the `records` table:
//! each bulk put runs in one transaction and upserts by `object_id`, so
//! writing the same identifier again overwrites the row. It also keeps a
//! `runs` table with one summary row per harvest, read by `harvest stats`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use channel_harvester_core::models::{NormalizedRecord, PutResponse};
use channel_harvester_core::store::{check_put_size, PersistenceSink};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::pipeline::HarvestOutcome;

/// A record row as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub object_id: String,
    pub datastore: String,
    pub user: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub id: String,
    pub channel: String,
    pub finished_at: i64,
    pub state: String,
    pub pages_fetched: i64,
    pub messages: i64,
    pub records_persisted: i64,
    pub failures: i64,
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `[db].path` and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn get_record(&self, object_id: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT object_id, datastore, user, message, replies, updated_at FROM records WHERE object_id = ?",
        )
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StoredRecord {
            object_id: row.get("object_id"),
            datastore: row.get("datastore"),
            user: row.get("user"),
            message: row.get("message"),
            replies: row.get("replies"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// Record counts per datastore, largest first.
    pub async fn count_records(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT datastore, COUNT(*) AS n FROM records GROUP BY datastore ORDER BY n DESC, datastore",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("datastore"), row.get("n")))
            .collect())
    }

    /// Persist a run summary. Returns the run id.
    pub async fn record_run(
        &self,
        channel: &str,
        started_at: DateTime<Utc>,
        outcome: &HarvestOutcome,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let report = &outcome.report;
        let report_json = serde_json::to_string(report)?;

        sqlx::query(
            r#"
            INSERT INTO runs (id, channel, started_at, finished_at, state, pages_fetched,
                              messages, records_persisted, failures, report_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(channel)
        .bind(started_at.timestamp())
        .bind(Utc::now().timestamp())
        .bind(outcome.state.as_str())
        .bind(report.pages_fetched as i64)
        .bind(report.messages as i64)
        .bind(report.records_persisted as i64)
        .bind(report.failures.len() as i64)
        .bind(&report_json)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel, finished_at, state, pages_fetched, messages,
                   records_persisted, failures
            FROM runs
            ORDER BY finished_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RunSummary {
                id: row.get("id"),
                channel: row.get("channel"),
                finished_at: row.get("finished_at"),
                state: row.get("state"),
                pages_fetched: row.get("pages_fetched"),
                messages: row.get("messages"),
                records_persisted: row.get("records_persisted"),
                failures: row.get("failures"),
            })
            .collect())
    }
}

#[async_trait]
impl PersistenceSink for SqliteStore {
    async fn put(&self, datastore: &str, items: &[NormalizedRecord]) -> Result<PutResponse> {
        if let Some(rejected) = check_put_size(items) {
            return Ok(rejected);
        }

        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO records (object_id, datastore, user, message, replies, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(object_id) DO UPDATE SET
                    datastore = excluded.datastore,
                    user = excluded.user,
                    message = excluded.message,
                    replies = excluded.replies,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(item.object_id.to_string())
            .bind(datastore)
            .bind(&item.user)
            .bind(&item.message)
            .bind(item.replies.as_deref())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(PutResponse::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::pipeline::{HarvestReport, HarvestState};
    use channel_harvester_core::store::TOO_MANY_ITEMS;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteStore {
        let db_path = dir.path().join("data").join("harvest.sqlite");
        let config = parse_config(&format!("[db]\npath = \"{}\"\n", db_path.display())).unwrap();
        SqliteStore::open(&config).await.unwrap()
    }

    fn record(id: u128, message: &str, replies: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            object_id: Uuid::from_u128(id),
            user: "U1".to_string(),
            message: message.to_string(),
            replies: replies.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn put_upserts_by_object_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let first = store
            .put("SampleObjects", &[record(1, "hello", None), record(2, "root", Some("root\nreply"))])
            .await
            .unwrap();
        assert!(first.ok);

        let again = store
            .put("SampleObjects", &[record(1, "hello, edited", None)])
            .await
            .unwrap();
        assert!(again.ok);

        assert_eq!(
            store.count_records().await.unwrap(),
            vec![("SampleObjects".to_string(), 2)]
        );
        let row = store
            .get_record(&Uuid::from_u128(1).to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.message, "hello, edited");
        assert_eq!(row.replies, None);

        let threaded = store
            .get_record(&Uuid::from_u128(2).to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(threaded.replies.as_deref(), Some("root\nreply"));
        store.close().await;
    }

    #[tokio::test]
    async fn oversized_put_is_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let items: Vec<_> = (0..26).map(|i| record(i, "m", None)).collect();
        let resp = store.put("SampleObjects", &items).await.unwrap();

        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some(TOO_MANY_ITEMS));
        assert!(store.count_records().await.unwrap().is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.get_record("nope").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn run_summary_is_recorded() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let outcome = HarvestOutcome {
            completed: false,
            state: HarvestState::AwaitingExternalCompletion,
            report: HarvestReport {
                pages_fetched: 3,
                messages: 60,
                records_persisted: 50,
                ..Default::default()
            },
        };
        let id = store.record_run("C1", Utc::now(), &outcome).await.unwrap();

        let runs = store.recent_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, id);
        assert_eq!(runs[0].channel, "C1");
        assert_eq!(runs[0].state, "awaiting_external_completion");
        assert_eq!(runs[0].pages_fetched, 3);
        assert_eq!(runs[0].records_persisted, 50);
        assert_eq!(runs[0].failures, 0);
        store.close().await;
    }
}
