//! SQLite workflow history repository.
//!
//! One row per event. Events are stored as JSON text; `event_type` is kept
//! in its own column so open instances can be found without decoding.

use brewline_core::repository::history::HistoryRepository;
use brewline_types::error::RepositoryError;
use brewline_types::history::{HistoryEvent, HistoryRecord};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `HistoryRepository`.
pub struct SqliteHistoryRepository {
    pool: DatabasePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct HistoryRow {
    instance_key: String,
    sequence: i64,
    event: String,
    recorded_at: String,
}

impl HistoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            instance_key: row.try_get("instance_key")?,
            sequence: row.try_get("sequence")?,
            event: row.try_get("event")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    fn into_record(self) -> Result<HistoryRecord, RepositoryError> {
        let sequence = u64::try_from(self.sequence)
            .map_err(|_| RepositoryError::Query(format!("invalid sequence: {}", self.sequence)))?;
        let event: HistoryEvent = serde_json::from_str(&self.event)
            .map_err(|e| RepositoryError::Query(format!("invalid history event: {e}")))?;

        Ok(HistoryRecord {
            instance_key: self.instance_key,
            sequence,
            event,
            recorded_at: parse_datetime(&self.recorded_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn map_write_error(record: &HistoryRecord, err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
            format!("{} already has sequence {}", record.instance_key, record.sequence),
        ),
        _ => RepositoryError::Query(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// HistoryRepository implementation
// ---------------------------------------------------------------------------

impl HistoryRepository for SqliteHistoryRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<(), RepositoryError> {
        let sequence = i64::try_from(record.sequence)
            .map_err(|_| RepositoryError::Query(format!("sequence out of range: {}", record.sequence)))?;
        let event = serde_json::to_string(&record.event)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize event: {e}")))?;

        sqlx::query(
            r#"INSERT INTO workflow_history (instance_key, sequence, event_type, event, recorded_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&record.instance_key)
        .bind(sequence)
        .bind(record.event.event_type())
        .bind(&event)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(record, e))?;

        Ok(())
    }

    async fn load(&self, instance_key: &str) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT instance_key, sequence, event, recorded_at FROM workflow_history WHERE instance_key = ? ORDER BY sequence",
        )
        .bind(instance_key)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                HistoryRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }

    async fn list_open(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT instance_key FROM workflow_history
               WHERE event_type = 'workflow_started'
                 AND instance_key NOT IN (
                     SELECT instance_key FROM workflow_history WHERE event_type = 'workflow_closed'
                 )
               ORDER BY instance_key"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get("instance_key")
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }

    async fn exists(&self, instance_key: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 AS found FROM workflow_history WHERE instance_key = ? LIMIT 1")
            .bind(instance_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }
}
