use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ErrorCode, Job, JobId, JobStatus, StorageKey};

use super::RepositoryError;

/// The relational store is the only shared mutable authority; every method
/// here is a single row-scoped statement.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Cheap status-only read, used as the cancellation probe.
    async fn status_of(&self, id: JobId) -> Result<Option<JobStatus>, RepositoryError>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError>;

    /// Atomic guarded transition. Returns true when the row was in one of the
    /// `expected` statuses and has been moved to `next`.
    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobStatus,
    ) -> Result<bool, RepositoryError>;

    async fn set_original_artifact(
        &self,
        id: JobId,
        key: &StorageKey,
        filename: &str,
        file_size_bytes: i64,
        extension: &str,
    ) -> Result<(), RepositoryError>;

    async fn set_duration(&self, id: JobId, duration_seconds: f64) -> Result<(), RepositoryError>;

    async fn set_total_chunks(&self, id: JobId, total: i32) -> Result<(), RepositoryError>;

    async fn increment_completed_chunks(&self, id: JobId) -> Result<(), RepositoryError>;

    /// Terminal success: sets result key and completion timestamp. Guarded so
    /// a cancelled or failed job is never resurrected.
    async fn mark_completed(
        &self,
        id: JobId,
        result_key: &StorageKey,
    ) -> Result<bool, RepositoryError>;

    /// Terminal failure with classified code. Guarded against terminal rows.
    async fn mark_failed(
        &self,
        id: JobId,
        code: ErrorCode,
        message: &str,
    ) -> Result<bool, RepositoryError>;

    /// Back to PENDING with error fields and progress cleared, for retry of a
    /// failed job.
    async fn reset_for_retry(&self, id: JobId) -> Result<(), RepositoryError>;

    async fn mark_webhook_sent(&self, id: JobId) -> Result<(), RepositoryError>;

    /// Bulk recovery: PROCESSING/UPLOADED rows untouched since `cutoff` are
    /// marked FAILED. Returns the number of rows swept.
    async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;

    async fn delete(&self, id: JobId) -> Result<(), RepositoryError>;
}
