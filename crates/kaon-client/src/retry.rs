// kaon-client/src/retry.rs

use crate::error::{KaonError, KaonResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed-delay retry for transient node errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out. Shutdown is checked between attempts.
    pub async fn run<T, F, Fut>(&self, shutdown: &CancellationToken, mut op: F) -> KaonResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = KaonResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    tracing::debug!(error = %err, attempt, "Transient kaond error, retrying");
                    attempt += 1;
                    tokio::select! {
                        _ = shutdown.cancelled() => return Err(KaonError::Shutdown),
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_retries_work_queue_depth() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run(&CancellationToken::new(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                    Err(KaonError::WorkQueueDepth)
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_hard_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: KaonResult<()> = RetryPolicy::default()
            .run(&CancellationToken::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KaonError::InvalidAddress("bad".into()))
            })
            .await;

        assert!(matches!(result, Err(KaonError::InvalidAddress(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts: 3,
        };
        let calls = AtomicU32::new(0);
        let result: KaonResult<()> = policy
            .run(&CancellationToken::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KaonError::TryAgain("loading".into()))
            })
            .await;

        assert!(matches!(result, Err(KaonError::TryAgain(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let result: KaonResult<()> = RetryPolicy::default()
            .run(&shutdown, || async { Err(KaonError::WorkQueueDepth) })
            .await;

        assert!(matches!(result, Err(KaonError::Shutdown)));
    }
}
