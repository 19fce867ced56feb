use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::RetryPolicy;
use crate::Result;

/// Run-wide choke point for calls to external services.
///
/// Every attempt holds one permit of a shared semaphore, so `max_concurrent` bounds the
/// number of in-flight requests across all records and batches. The permit is released
/// while the retry policy backs off.
#[derive(Debug, Clone)]
pub struct CallGate {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    policy: RetryPolicy,
}

impl CallGate {
    pub fn new(max_concurrent: usize, policy: RetryPolicy) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            policy,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Call an external service under the concurrency cap and retry policy
    pub async fn call<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.policy
            .run_with_permits(label, Some(&self.permits), op)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_caps_in_flight_calls() {
        let gate = CallGate::new(3, RetryPolicy::default());
        let peak = AtomicUsize::new(0);

        let calls = (0..10).map(|i| {
            let gate = &gate;
            let peak = &peak;
            async move {
                gate.call("sleepy", move || async move {
                    peak.fetch_max(gate.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(i)
                })
                .await
            }
        });
        let results = join_all(calls).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let gate = CallGate::new(0, RetryPolicy::default());
        assert_eq!(gate.max_concurrent(), 1);
        assert_eq!(gate.in_flight(), 0);
    }
}
