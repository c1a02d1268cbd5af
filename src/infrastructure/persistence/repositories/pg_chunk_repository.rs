use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{ChunkRepository, RepositoryError};
use crate::domain::{Chunk, ChunkStatus, JobId, ProviderMetadata, Segment, StorageKey};

pub struct PgChunkRepository {
    pool: PgPool,
}

impl PgChunkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn chunk_from_row(row: &PgRow) -> Result<Chunk, RepositoryError> {
    let status: String = row.try_get("status").map_err(query_failed)?;
    let status = status
        .parse::<ChunkStatus>()
        .map_err(RepositoryError::QueryFailed)?;

    let storage_key: Option<String> = row.try_get("storage_key").map_err(query_failed)?;
    let segments: Option<Json<Vec<Segment>>> = row.try_get("segments").map_err(query_failed)?;
    let metadata: Option<Json<ProviderMetadata>> =
        row.try_get("metadata").map_err(query_failed)?;

    Ok(Chunk {
        job_id: JobId::from_uuid(row.try_get("job_id").map_err(query_failed)?),
        chunk_index: row.try_get("chunk_index").map_err(query_failed)?,
        status,
        start_time: row.try_get("start_time").map_err(query_failed)?,
        end_time: row.try_get("end_time").map_err(query_failed)?,
        storage_key: storage_key.map(StorageKey::from_raw),
        attempt_count: row.try_get("attempt_count").map_err(query_failed)?,
        last_error: row.try_get("last_error").map_err(query_failed)?,
        segments: segments.map(|j| j.0).unwrap_or_default(),
        metadata: metadata.map(|j| j.0).unwrap_or_default(),
        created_at: row.try_get("created_at").map_err(query_failed)?,
        processed_at: row.try_get("processed_at").map_err(query_failed)?,
    })
}

const CHUNK_COLUMNS: &str = "job_id, chunk_index, status, start_time, end_time, storage_key, \
     attempt_count, last_error, segments, metadata, created_at, processed_at";

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn create_many(&self, chunks: &[Chunk]) -> Result<(), RepositoryError> {
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (job_id, chunk_index, status, start_time, end_time,
                    storage_key, attempt_count, last_error, segments, metadata,
                    created_at, processed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(chunk.job_id.as_uuid())
            .bind(chunk.chunk_index)
            .bind(chunk.status.as_str())
            .bind(chunk.start_time)
            .bind(chunk.end_time)
            .bind(chunk.storage_key.as_ref().map(|k| k.as_str().to_string()))
            .bind(chunk.attempt_count)
            .bind(&chunk.last_error)
            .bind(Json(&chunk.segments))
            .bind(Json(&chunk.metadata))
            .bind(chunk.created_at)
            .bind(chunk.processed_at)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        }

        Ok(())
    }

    async fn get(
        &self,
        job_id: JobId,
        chunk_index: i32,
    ) -> Result<Option<Chunk>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE job_id = $1 AND chunk_index = $2",
            CHUNK_COLUMNS
        ))
        .bind(job_id.as_uuid())
        .bind(chunk_index)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(chunk_from_row).transpose()
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<Chunk>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE job_id = $1 ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(chunk_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %job_id, chunk_index))]
    async fn mark_processing(
        &self,
        job_id: JobId,
        chunk_index: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE chunks
            SET status = 'PROCESSING', attempt_count = attempt_count + 1
            WHERE job_id = $1 AND chunk_index = $2
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(chunk_index)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self, segments, metadata), fields(job_id = %job_id, chunk_index))]
    async fn mark_completed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        segments: &[Segment],
        metadata: &ProviderMetadata,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE chunks
            SET status = 'COMPLETED', segments = $1, metadata = $2,
                last_error = NULL, processed_at = $3
            WHERE job_id = $4 AND chunk_index = $5
            "#,
        )
        .bind(Json(segments))
        .bind(Json(metadata))
        .bind(Utc::now())
        .bind(job_id.as_uuid())
        .bind(chunk_index)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self, error), fields(job_id = %job_id, chunk_index))]
    async fn mark_failed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        error: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE chunks
            SET status = 'FAILED', last_error = $1, processed_at = $2
            WHERE job_id = $3 AND chunk_index = $4
            "#,
        )
        .bind(error)
        .bind(Utc::now())
        .bind(job_id.as_uuid())
        .bind(chunk_index)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    async fn delete_for_job(&self, job_id: JobId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM chunks WHERE job_id = $1")
            .bind(job_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;

        Ok(result.rows_affected())
    }
}
