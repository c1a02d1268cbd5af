use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::application::ports::JobRepository;
use crate::domain::JobId;

const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Best-effort completion notification. Delivery runs detached from the
/// worker so a slow receiver never blocks the pipeline.
pub struct WebhookNotifier {
    client: reqwest::Client,
    jobs: Arc<dyn JobRepository>,
    retry_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(jobs: Arc<dyn JobRepository>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            jobs,
            retry_delay: Duration::from_secs(60),
        }
    }

    pub fn notify_later(self: Arc<Self>, job_id: JobId, url: String) {
        tokio::spawn(async move {
            self.deliver(job_id, &url).await;
        });
    }

    async fn deliver(&self, job_id: JobId, url: &str) {
        for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
            let job = match self.jobs.get_by_id(job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tracing::warn!(job_id = %job_id, "Job deleted before webhook delivery");
                    return;
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Webhook payload load failed");
                    return;
                }
            };

            let payload = json!({
                "job_id": job_id.to_string(),
                "status": job.status.as_str(),
                "result_key": job.result_key.as_ref().map(|k| k.as_str().to_string()),
                "completed_at": job.completed_at.map(|t| t.to_rfc3339()),
            });

            let outcome = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => {
                    if let Err(e) = self.jobs.mark_webhook_sent(job_id).await {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to record webhook delivery");
                    }
                    tracing::info!(job_id = %job_id, webhook_url = url, "Webhook sent");
                    return;
                }
                Ok(response) => {
                    tracing::warn!(
                        job_id = %job_id,
                        webhook_url = url,
                        status = %response.status(),
                        attempt,
                        "Webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        webhook_url = url,
                        error = %e,
                        attempt,
                        "Webhook delivery failed"
                    );
                }
            }

            if attempt < MAX_DELIVERY_ATTEMPTS {
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
        }

        tracing::error!(job_id = %job_id, webhook_url = url, "Webhook delivery gave up");
    }
}
