use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{JobRepository, RepositoryError};
use crate::domain::{ErrorCode, Job, JobId, JobStatus, StorageKey};

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn job_from_row(row: &PgRow) -> Result<Job, RepositoryError> {
    let status: String = row.try_get("status").map_err(query_failed)?;
    let status = status
        .parse::<JobStatus>()
        .map_err(RepositoryError::QueryFailed)?;

    let error_code: Option<String> = row.try_get("error_code").map_err(query_failed)?;
    let error_code = error_code
        .map(|c| c.parse::<ErrorCode>())
        .transpose()
        .map_err(RepositoryError::QueryFailed)?;

    let original_key: Option<String> = row.try_get("original_key").map_err(query_failed)?;
    let result_key: Option<String> = row.try_get("result_key").map_err(query_failed)?;

    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(query_failed)?),
        status,
        original_filename: row.try_get("original_filename").map_err(query_failed)?,
        file_size_bytes: row.try_get("file_size_bytes").map_err(query_failed)?,
        extension: row.try_get("extension").map_err(query_failed)?,
        duration_seconds: row.try_get("duration_seconds").map_err(query_failed)?,
        provider: row.try_get("provider").map_err(query_failed)?,
        language: row.try_get("language").map_err(query_failed)?,
        prompt: row.try_get("prompt").map_err(query_failed)?,
        webhook_url: row.try_get("webhook_url").map_err(query_failed)?,
        webhook_sent: row.try_get("webhook_sent").map_err(query_failed)?,
        original_key: original_key.map(StorageKey::from_raw),
        result_key: result_key.map(StorageKey::from_raw),
        total_chunks: row.try_get("total_chunks").map_err(query_failed)?,
        completed_chunks: row.try_get("completed_chunks").map_err(query_failed)?,
        error_message: row.try_get("error_message").map_err(query_failed)?,
        error_code,
        created_at: row.try_get("created_at").map_err(query_failed)?,
        updated_at: row.try_get("updated_at").map_err(query_failed)?,
        completed_at: row.try_get("completed_at").map_err(query_failed)?,
    })
}

const JOB_COLUMNS: &str = "id, status, original_filename, file_size_bytes, extension, \
     duration_seconds, provider, language, prompt, webhook_url, webhook_sent, \
     original_key, result_key, total_chunks, completed_chunks, error_message, \
     error_code, created_at, updated_at, completed_at";

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, status, original_filename, file_size_bytes, extension,
                duration_seconds, provider, language, prompt, webhook_url, webhook_sent,
                original_key, result_key, total_chunks, completed_chunks, error_message,
                error_code, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.status.as_str())
        .bind(&job.original_filename)
        .bind(job.file_size_bytes)
        .bind(&job.extension)
        .bind(job.duration_seconds)
        .bind(&job.provider)
        .bind(&job.language)
        .bind(&job.prompt)
        .bind(&job.webhook_url)
        .bind(job.webhook_sent)
        .bind(job.original_key.as_ref().map(|k| k.as_str().to_string()))
        .bind(job.result_key.as_ref().map(|k| k.as_str().to_string()))
        .bind(job.total_chunks)
        .bind(job.completed_chunks)
        .bind(&job.error_message)
        .bind(job.error_code.map(|c| c.as_str()))
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn status_of(&self, id: JobId) -> Result<Option<JobStatus>, RepositoryError> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.map(|r| {
            let status: String = r.try_get("status").map_err(query_failed)?;
            status
                .parse::<JobStatus>()
                .map_err(RepositoryError::QueryFailed)
        })
        .transpose()
    }

    #[instrument(skip(self), fields(status = %status))]
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE status = $1 ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %id, next = %next))]
    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobStatus,
    ) -> Result<bool, RepositoryError> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();

        let result = sqlx::query(
            "UPDATE jobs SET status = $1, updated_at = $2 WHERE id = $3 AND status = ANY($4)",
        )
        .bind(next.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(&expected)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_original_artifact(
        &self,
        id: JobId,
        key: &StorageKey,
        filename: &str,
        file_size_bytes: i64,
        extension: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET original_key = $1, original_filename = $2, file_size_bytes = $3,
                extension = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(key.as_str())
        .bind(filename)
        .bind(file_size_bytes)
        .bind(extension)
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn set_duration(&self, id: JobId, duration_seconds: f64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE jobs SET duration_seconds = $1, updated_at = $2 WHERE id = $3")
            .bind(duration_seconds)
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        Ok(())
    }

    async fn set_total_chunks(&self, id: JobId, total: i32) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE jobs SET total_chunks = $1, completed_chunks = 0, updated_at = $2 WHERE id = $3",
        )
        .bind(total)
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn increment_completed_chunks(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE jobs SET completed_chunks = completed_chunks + 1, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self, result_key), fields(job_id = %id))]
    async fn mark_completed(
        &self,
        id: JobId,
        result_key: &StorageKey,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'COMPLETED', result_key = $1, completed_at = $2, updated_at = $2
            WHERE id = $3 AND status = 'PROCESSING'
            "#,
        )
        .bind(result_key.as_str())
        .bind(now)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, message), fields(job_id = %id, error_code = %code))]
    async fn mark_failed(
        &self,
        id: JobId,
        code: ErrorCode,
        message: &str,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', error_code = $1, error_message = $2,
                completed_at = $3, updated_at = $3
            WHERE id = $4 AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
            "#,
        )
        .bind(code.as_str())
        .bind(message)
        .bind(now)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_for_retry(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'PENDING', error_code = NULL, error_message = NULL,
                result_key = NULL, total_chunks = 0, completed_chunks = 0,
                completed_at = NULL, updated_at = $1
            WHERE id = $2 AND status = 'FAILED'
            "#,
        )
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn mark_webhook_sent(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE jobs SET webhook_sent = TRUE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'FAILED', error_code = 'timeout',
                error_message = 'job stalled in processing and was recovered by the stale sweep',
                updated_at = $1
            WHERE status IN ('PROCESSING', 'UPLOADED') AND updated_at < $2
            "#,
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn delete(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        Ok(())
    }
}
