use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::application::ports::{JobQueue, QueueError, QueueMessage};
use crate::domain::JobId;

/// Process-local queue backed by a tokio channel. Durable brokers sit behind
/// the same port in deployments that need redelivery across restarts; here
/// un-acked tags are only tracked for observability.
pub struct InMemoryJobQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<QueueMessage>>,
    next_tag: AtomicU64,
    in_flight: StdMutex<HashSet<u64>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            next_tag: AtomicU64::new(1),
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError> {
        let message = QueueMessage {
            job_id,
            delivery_tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
        };
        self.tx
            .send(message)
            .map_err(|e| QueueError::PublishFailed(e.to_string()))
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(message) => {
                self.in_flight
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(message.delivery_tag);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&message.delivery_tag);
        Ok(())
    }
}
