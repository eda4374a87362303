use super::{Feedback, FeedbackEntry, NewSummary, SummaryRecord, SummaryStore};
use crate::config::SummarizerKind;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "summary_id, user_id, display_name, base_name, model, custom_prompt, \
     summary, input_data, file_url, created_at, feedback_rating, feedback_comment, feedback_at";

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteSummaryStore {
    pool: SqlitePool,
}

impl SqliteSummaryStore {
    /// Open (creating if needed) the database file at `path` and migrate it.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Open(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open(format!("{}: {}", path.display(), e)))?;

        info!("Summary store: {}", path.display());
        Self::from_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// A single connection that never expires, since each SQLite memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                user_id TEXT NOT NULL,
                summary_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                base_name TEXT NOT NULL,
                model TEXT NOT NULL,
                custom_prompt TEXT NOT NULL,
                summary TEXT NOT NULL,
                input_data TEXT NOT NULL,
                file_url TEXT,
                created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),
                feedback_rating TEXT,
                feedback_comment TEXT,
                feedback_at INTEGER,
                PRIMARY KEY (user_id, summary_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Open(format!("migration failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_summaries_lookup ON summaries(user_id, base_name, model)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Open(format!("migration failed: {e}")))?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {secs}")))
}

fn record_from_row(row: &SqliteRow) -> Result<SummaryRecord, StoreError> {
    let col = |e: sqlx::Error| StoreError::QueryFailed(e.to_string());

    let model: String = row.try_get("model").map_err(col)?;
    let model = SummarizerKind::from_str(&model)
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;

    let rating: Option<String> = row.try_get("feedback_rating").map_err(col)?;
    let feedback = match rating {
        Some(rating) => {
            let recorded_at: Option<i64> = row.try_get("feedback_at").map_err(col)?;
            Some(FeedbackEntry {
                rating: rating.parse()?,
                comment: row.try_get("feedback_comment").map_err(col)?,
                recorded_at: timestamp(recorded_at.unwrap_or_default())?,
            })
        }
        None => None,
    };

    Ok(SummaryRecord {
        summary_id: row.try_get("summary_id").map_err(col)?,
        user_id: row.try_get("user_id").map_err(col)?,
        display_name: row.try_get("display_name").map_err(col)?,
        base_name: row.try_get("base_name").map_err(col)?,
        model,
        custom_prompt: row.try_get("custom_prompt").map_err(col)?,
        summary: row.try_get("summary").map_err(col)?,
        input_data: row.try_get("input_data").map_err(col)?,
        file_url: row.try_get("file_url").map_err(col)?,
        created_at: timestamp(row.try_get("created_at").map_err(col)?)?,
        feedback,
    })
}

#[async_trait]
impl SummaryStore for SqliteSummaryStore {
    async fn find(
        &self,
        user_id: &str,
        base_name: &str,
        model: SummarizerKind,
    ) -> Result<Vec<SummaryRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM summaries \
             WHERE user_id = ? AND base_name = ? AND model = ? \
             ORDER BY created_at, rowid"
        ))
        .bind(user_id)
        .bind(base_name)
        .bind(model.selector())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        debug!(
            "Store lookup ({}, {}, {}): {} records",
            user_id,
            base_name,
            model,
            rows.len()
        );
        rows.iter().map(record_from_row).collect()
    }

    async fn create(&self, record: NewSummary) -> Result<SummaryRecord, StoreError> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO summaries
                (user_id, summary_id, display_name, base_name, model, custom_prompt,
                 summary, input_data, file_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING created_at
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.summary_id)
        .bind(&record.display_name)
        .bind(&record.base_name)
        .bind(record.model.selector())
        .bind(&record.custom_prompt)
        .bind(&record.summary)
        .bind(&record.input_data)
        .bind(&record.file_url)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created_at) => Ok(SummaryRecord::from_new(record, timestamp(created_at)?)),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() || db.message().contains("UNIQUE constraint failed") =>
            {
                Err(StoreError::IdConflict {
                    summary_id: record.summary_id,
                })
            }
            Err(e) => Err(StoreError::WriteFailed {
                summary_id: record.summary_id,
                detail: e.to_string(),
            }),
        }
    }

    async fn get(
        &self,
        user_id: &str,
        summary_id: &str,
    ) -> Result<Option<SummaryRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM summaries WHERE user_id = ? AND summary_id = ?"
        ))
        .bind(user_id)
        .bind(summary_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn record_feedback(
        &self,
        user_id: &str,
        summary_id: &str,
        feedback: Feedback,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE summaries
            SET feedback_rating = ?,
                feedback_comment = ?,
                feedback_at = CAST(strftime('%s', 'now') AS INTEGER)
            WHERE user_id = ? AND summary_id = ?
            "#,
        )
        .bind(feedback.rating.as_str())
        .bind(&feedback.comment)
        .bind(user_id)
        .bind(summary_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed {
            summary_id: summary_id.to_string(),
            detail: e.to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                summary_id: summary_id.to_string(),
            });
        }
        Ok(())
    }
}
