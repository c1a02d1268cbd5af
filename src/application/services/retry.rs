use std::time::Duration;

use rand::Rng;

use crate::config::RetrySettings;

/// Backoff schedule for transient provider faults. Coverage-gap retries are
/// budgeted separately from transient attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub coverage_retries: u32,
    base_delay_seconds: f64,
    max_delay_seconds: f64,
    exponential_base: f64,
    jitter_max_seconds: f64,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            coverage_retries: settings.coverage_retries,
            base_delay_seconds: settings.base_delay_seconds,
            max_delay_seconds: settings.max_delay_seconds,
            exponential_base: settings.exponential_base,
            jitter_max_seconds: settings.jitter_max_seconds,
        }
    }

    /// Delay before the retry following `attempt` (0-indexed). A provider
    /// Retry-After hint overrides the exponential schedule but still gets
    /// jitter so a fleet of workers does not stampede.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<f64>) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_max_seconds);

        let seconds = match retry_after {
            Some(hint) => hint + jitter,
            None => {
                let backoff = self.base_delay_seconds
                    * self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
                backoff.min(self.max_delay_seconds) + jitter
            }
        };

        Duration::from_secs_f64(seconds.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}
