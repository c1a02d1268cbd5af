use async_trait::async_trait;

use crate::domain::JobId;

/// A queue message carries only the job id; the full job state lives in the
/// store.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub job_id: JobId,
    pub delivery_tag: u64,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError>;

    /// Blocks until a message is available. `None` means the queue has been
    /// closed and workers should drain out.
    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError>;

    /// Acknowledge a message. Called only once the job has reached a
    /// terminal status; un-acked messages stay redeliverable.
    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,
    #[error("publish failed: {0}")]
    PublishFailed(String),
}
