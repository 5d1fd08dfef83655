// SQLite Job Store Implementation

use async_trait::async_trait;
use jobrelay_core::domain::{Identity, Job, JobId, JobPayload, JobState};
use jobrelay_core::error::{AppError, Result};
use jobrelay_core::port::job_store::authorize;
use jobrelay_core::port::{JobRepository, JobStore};
use sqlx::SqlitePool;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn get(&self, id: &JobId, identity: &Identity) -> Result<Job> {
        let job = self.find_by_id(id).await?;
        authorize(id, job, identity)
    }
}

#[async_trait]
impl JobRepository for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, provider, state, message, owner, payload,
                created_at, updated_at, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.provider)
        .bind(job.state.to_string())
        .bind(&job.message)
        .bind(&job.owner)
        .bind(job.payload.as_value().to_string())
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(job_id = %job.id, provider = %job.provider, "Job inserted");
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, message = ?, owner = ?, payload = ?,
                updated_at = ?, started_at = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(&job.message)
        .bind(&job.owner)
        .bind(job.payload.as_value().to_string())
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, id ASC")
                .bind(state.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    provider: String,
    state: String,
    message: Option<String>,
    owner: Option<String>,
    payload: String,
    created_at: i64,
    updated_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state = JobState::parse(&self.state).ok_or_else(|| {
            AppError::Database(format!(
                "Job {} has unknown state '{}'",
                self.id, self.state
            ))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            provider: self.provider,
            state,
            message: self.message,
            owner: self.owner,
            payload: JobPayload::new(payload),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}
