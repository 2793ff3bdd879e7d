use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, Row};
use tracing::info;

use super::HistoryStore;
use crate::dispatch::OutcomeRecord;
use crate::storage::history::entity::Model as HistoryModel;
use crate::web::Pagination;

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite history storage at {}", database_url);
        let pool = sqlx::SqlitePool::connect(database_url).await?;

        // 创建结果历史表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL,
                status TEXT NOT NULL,
                trigger_type TEXT,
                job_id TEXT,
                job_name TEXT,
                error_type TEXT,
                error_message TEXT,
                record TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_outcomes_message_id ON outcomes (message_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    fn row_to_model(&self, row: sqlx::sqlite::SqliteRow) -> Result<HistoryModel> {
        Ok(HistoryModel {
            id: row.get("id"),
            message_id: row.get("message_id"),
            status: row.get("status"),
            trigger_type: row.get("trigger_type"),
            job_id: row.get("job_id"),
            job_name: row.get("job_name"),
            error_type: row.get("error_type"),
            error_message: row.get("error_message"),
            record: row.get("record"),
            recorded_at: DateTime::parse_from_rfc3339(row.get("recorded_at"))?.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, outcome: &OutcomeRecord) -> Result<()> {
        let model = HistoryModel::try_from(outcome)?;

        sqlx::query(
            r#"
            INSERT INTO outcomes
            (message_id, status, trigger_type, job_id, job_name, error_type, error_message, record, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.message_id)
        .bind(&model.status)
        .bind(&model.trigger_type)
        .bind(&model.job_id)
        .bind(&model.job_name)
        .bind(&model.error_type)
        .bind(&model.error_message)
        .bind(&model.record)
        .bind(model.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, pagination: &Pagination) -> Result<Vec<HistoryModel>> {
        let pagination = pagination.check();
        let rows = sqlx::query("SELECT * FROM outcomes ORDER BY id DESC LIMIT ? OFFSET ?")
            .bind(i64::try_from(pagination.limit()).unwrap_or(i64::MAX))
            .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut models = Vec::new();
        for row in rows {
            models.push(self.row_to_model(row)?);
        }
        Ok(models)
    }

    async fn get_by_message_id(&self, message_id: &str) -> Result<Vec<HistoryModel>> {
        let rows = sqlx::query("SELECT * FROM outcomes WHERE message_id = ? ORDER BY id DESC")
            .bind(message_id)
            .fetch_all(&self.pool)
            .await?;

        let mut models = Vec::new();
        for row in rows {
            models.push(self.row_to_model(row)?);
        }
        Ok(models)
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM outcomes")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }
}
