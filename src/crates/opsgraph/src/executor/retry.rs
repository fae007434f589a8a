//! Retry logic with exponential backoff
//!
//! Executor-internal retries for transient failures (a flaky registry, a
//! subprocess that timed out). The workflow graph never retries through this
//! path; it only sees the final outcome.

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: usize,

    /// Initial delay before first retry (in seconds)
    pub initial_delay_secs: u64,

    /// Maximum delay between retries (in seconds)
    pub max_delay_secs: u64,

    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_secs: 1,
            max_delay_secs: 60,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: usize, initial_delay_secs: u64, max_delay_secs: u64, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay_secs,
            max_delay_secs,
            multiplier,
        }
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let delay_secs = (self.initial_delay_secs as f64) * self.multiplier.powi(attempt as i32);
        let capped_delay = delay_secs.min(self.max_delay_secs as f64);
        Duration::from_secs(capped_delay as u64)
    }
}

/// Execute an operation with retry logic
///
/// Stops early, returning [`OrchestratorError::Cancelled`], if `cancel` fires
/// while waiting between attempts. Cancellation errors returned by the
/// operation itself are never retried.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    label: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.calculate_delay(attempt - 1);
            debug!(
                executor = %label,
                attempt = attempt,
                delay_secs = delay.as_secs(),
                "Retrying after delay"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                _ = sleep(delay) => {}
            }
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(executor = %label, attempt = attempt, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(OrchestratorError::Cancelled) => return Err(OrchestratorError::Cancelled),
            Err(e) => {
                if attempt < config.max_retries {
                    warn!(
                        executor = %label,
                        attempt = attempt + 1,
                        max_retries = config.max_retries,
                        error = %e,
                        "Operation failed, will retry"
                    );
                } else {
                    warn!(
                        executor = %label,
                        attempt = attempt + 1,
                        error = %e,
                        "Operation failed, max retries exhausted"
                    );
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| OrchestratorError::Other(format!("{}: no attempts made", label))))
}
