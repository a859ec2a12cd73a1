use super::connector::FetchError;
use std::{future::Future, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after every further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, failures: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(failures.saturating_sub(1))
    }
}

/// Run `op`, retrying transient network failures with exponential backoff.
/// Any other error is returned on the spot.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut failures = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                failures += 1;
                let wait = policy.backoff(failures);
                tracing::warn!(
                    call = label,
                    attempt = failures,
                    wait_secs = wait.as_secs_f64(),
                    "Network error: {}",
                    err
                );
                tokio::time::sleep(wait).await;
                if failures >= policy.max_attempts {
                    return Err(FetchError::RetriesExhausted {
                        attempts: failures,
                        last: err.to_string(),
                    });
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn default_backoff_doubles_from_two_seconds() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (1..=3).map(|n| policy.backoff(n).as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8]);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&instant(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Network("connection reset".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&instant(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Network("tls handshake".into()))
        })
        .await;

        assert!(matches!(
            result,
            Err(FetchError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&instant(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::CommentsDisabled)
        })
        .await;

        assert!(matches!(result, Err(FetchError::CommentsDisabled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
