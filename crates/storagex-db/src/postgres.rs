//! Postgres-backed job store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

use storagex_models::{Job, JobId, JobStatus, Summary, UserId};

use crate::error::{DbError, DbResult};
use crate::store::JobStore;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// Create config from environment variables.
    pub fn from_env() -> DbResult<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| DbError::config_error("DATABASE_URL not set"))?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            acquire_timeout: Duration::from_secs(
                std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    owner_id: String,
    filename: String,
    status: String,
    s3_key: Option<String>,
    file_size: i64,
    created_at: NaiveDateTime,
    processed_at: Option<NaiveDateTime>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse().map_err(DbError::invalid_row)?;
        Ok(Job {
            id: JobId::from_string(row.id),
            owner_id: UserId::new(row.owner_id),
            filename: row.filename,
            status,
            s3_key: row.s3_key,
            file_size: row.file_size,
            created_at: row.created_at.and_utc(),
            processed_at: row.processed_at.map(|t| t.and_utc()),
        })
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    video_id: String,
    summary_text: String,
    created_at: NaiveDateTime,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary {
            video_id: JobId::from_string(row.video_id),
            text: row.summary_text,
            created_at: row.created_at.and_utc(),
        }
    }
}

/// Job store on the upload service's Postgres schema.
///
/// Timestamps are stored as naive UTC (`timestamp without time zone`) and
/// `owner_id` is an integer column, read back as text.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration.
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get_job(&self, id: &JobId) -> DbResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                id,
                CAST(owner_id AS TEXT) AS owner_id,
                filename,
                status,
                s3_key,
                CAST(COALESCE(file_size, 0) AS BIGINT) AS file_size,
                created_at,
                processed_at
            FROM video_jobs
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn insert_job(&self, job: &Job) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO video_jobs (id, owner_id, filename, status, s3_key, file_size, created_at, processed_at)
            VALUES ($1, CAST($2 AS INTEGER), $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.owner_id.as_str())
        .bind(&job.filename)
        .bind(job.status.as_str())
        .bind(&job.s3_key)
        .bind(job.file_size)
        .bind(job.created_at.naive_utc())
        .bind(job.processed_at.map(|t| t.naive_utc()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status), err)]
    async fn update_job(&self, job: &Job) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE video_jobs
            SET status = $2, s3_key = $3, processed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.status.as_str())
        .bind(&job.s3_key)
        .bind(job.processed_at.map(|t| t.naive_utc()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(job.id.to_string()));
        }
        debug!("Persisted job status {}", job.status);
        Ok(())
    }

    async fn get_summary(&self, video_id: &JobId) -> DbResult<Option<Summary>> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT video_id, summary_text, created_at
            FROM video_summaries
            WHERE video_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(video_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Summary::from))
    }

    #[instrument(skip(self, summary), fields(video_id = %summary.video_id), err)]
    async fn save_summary(&self, summary: &Summary) -> DbResult<()> {
        // One row per job regardless of a unique constraint on the table.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM video_summaries WHERE video_id = $1")
            .bind(summary.video_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO video_summaries (video_id, summary_text, created_at) VALUES ($1, $2, $3)",
        )
        .bind(summary.video_id.as_str())
        .bind(&summary.text)
        .bind(summary.created_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_summary(&self, video_id: &JobId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM video_summaries WHERE video_id = $1")
            .bind(video_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
