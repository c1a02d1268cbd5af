use async_trait::async_trait;

use crate::domain::{Chunk, JobId, ProviderMetadata, Segment};

use super::RepositoryError;

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn create_many(&self, chunks: &[Chunk]) -> Result<(), RepositoryError>;

    async fn get(&self, job_id: JobId, chunk_index: i32)
        -> Result<Option<Chunk>, RepositoryError>;

    /// All chunks of a job in ascending index order.
    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<Chunk>, RepositoryError>;

    /// PENDING/FAILED -> PROCESSING, incrementing the attempt counter.
    async fn mark_processing(&self, job_id: JobId, chunk_index: i32)
        -> Result<(), RepositoryError>;

    async fn mark_completed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        segments: &[Segment],
        metadata: &ProviderMetadata,
    ) -> Result<(), RepositoryError>;

    async fn mark_failed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        error: &str,
    ) -> Result<(), RepositoryError>;

    /// Drops all chunk rows of a job. Retried jobs restart from chunk 0, so
    /// completed chunks are never reused.
    async fn delete_for_job(&self, job_id: JobId) -> Result<u64, RepositoryError>;
}
