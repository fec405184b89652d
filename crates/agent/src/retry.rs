//! Model-call retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use codeweave_config::RetryConfig;
use codeweave_core::diagnostic::DetectedError;
use codeweave_core::error::ProviderError;
use codeweave_core::event::{DomainEvent, EventBus};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error_classifier::{self, MAX_ATTEMPTS};

/// How a retried call ended when it did not succeed.
#[derive(Debug)]
pub enum CallError {
    /// The cancellation token fired while waiting on the model or a backoff.
    Cancelled,
    /// Not retryable, or attempts exhausted.
    Failed(ProviderError),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(Duration::from_millis(config.base_delay_ms), config.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `base * 2^(attempt - 1)` for a 1-based attempt. No jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts, or `cancel` fires.
    ///
    /// Each failure is classified and appended to `detected`; failures that a
    /// later attempt recovered from are marked resolved.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        events: &EventBus,
        detected: &mut Vec<DetectedError>,
        mut op: F,
    ) -> Result<T, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let first_new = detected.len();
        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                r = op(attempt) => r,
            };

            let err = match outcome {
                Ok(value) => {
                    for d in &mut detected[first_new..] {
                        d.resolve();
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let error = error_classifier::detect_provider_error(&err, attempt);
            events.publish(DomainEvent::ErrorDetected {
                category: error.category,
                message: error.message.clone(),
                timestamp: Utc::now(),
            });
            let retry = error_classifier::is_retryable(error.category, error.severity, attempt, self.max_attempts);
            let category = error.category;
            detected.push(error);
            if !retry {
                return Err(CallError::Failed(err));
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                category = %category,
                error = %err,
                "Model call failed, retrying"
            );
            events.publish(DomainEvent::ModelCallRetried {
                attempt,
                delay_ms: delay.as_millis() as u64,
                category,
                timestamp: Utc::now(),
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
