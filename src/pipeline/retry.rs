use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::{EnrichError, Result};

/// Bounded attempts with linear-in-attempt backoff and a per-attempt timeout
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Wait before retry `n` is `backoff_unit * 2 * n`
    pub backoff_unit: Duration,

    /// Upper bound for a single attempt
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            call_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration, call_timeout: Option<Duration>) -> Self {
        Self {
            max_attempts,
            backoff_unit,
            call_timeout,
        }
    }

    /// Delay slept after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(attempt.saturating_mul(2))
            .unwrap_or(Duration::MAX)
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// A call that still fails is returned as [`EnrichError::RetriesExhausted`] carrying the
    /// last error. Errors that cannot succeed on retry are returned immediately.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_permits(label, None, op).await
    }

    /// Like [`RetryPolicy::run`], holding one permit of `permits` for each attempt.
    ///
    /// Waiting for the permit does not count against `call_timeout`, and the permit is
    /// released before backing off.
    pub(crate) async fn run_with_permits<T, F, Fut>(
        &self,
        label: &str,
        permits: Option<&Semaphore>,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = {
                let _permit = match permits {
                    Some(permits) => Some(
                        permits
                            .acquire()
                            .await
                            .map_err(|_| EnrichError::ExternalService("call gate closed".into()))?,
                    ),
                    None => None,
                };
                match self.call_timeout {
                    Some(limit) => timeout(limit, op())
                        .await
                        .unwrap_or(Err(EnrichError::Timeout(limit))),
                    None => op().await,
                }
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= attempts {
                tracing::error!("{} failed after {} attempts: {}", label, attempts, err);
                return Err(EnrichError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }

            let wait = self.backoff(attempt);
            tracing::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                label,
                attempt,
                attempts,
                err,
                wait
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}
