//! Bounded polling for client-rendered content.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::fetch::FetchError;

/// How long to wait for a condition and how often to check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationPolicy {
    timeout: Duration,
    interval: Duration,
}

impl HydrationPolicy {
    /// A zero interval is bumped to 1ms so polling can't spin.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Poll `probe` until it reports `true`, checking at least once.
///
/// Returns the number of probes made. Gives up with
/// [`FetchError::HydrationTimeout`] once the next check would land past the
/// deadline; probe errors end the wait immediately.
pub async fn wait_until<F, Fut>(
    policy: &HydrationPolicy,
    what: &str,
    mut probe: F,
) -> Result<u32, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, FetchError>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe().await? {
            debug!(what, attempts, elapsed_ms = started.elapsed().as_millis() as u64, "Condition met");
            return Ok(attempts);
        }

        if Instant::now() + policy.interval > deadline {
            return Err(FetchError::HydrationTimeout {
                what: what.to_string(),
                waited: policy.timeout,
            });
        }

        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(timeout_ms: u64, interval_ms: u64) -> HydrationPolicy {
        HydrationPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let attempts = wait_until(&policy(1000, 100), "page", || async { Ok(true) })
            .await
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_polls() {
        let calls = Cell::new(0);
        let attempts = wait_until(&policy(1000, 100), "page", || {
            calls.set(calls.get() + 1);
            let ready = calls.get() >= 4;
            async move { Ok(ready) }
        })
        .await
        .unwrap();
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_hanging() {
        let started = Instant::now();
        let result = wait_until(&policy(1000, 100), "market page", || async { Ok(false) }).await;

        match result {
            Err(FetchError::HydrationTimeout { what, waited }) => {
                assert_eq!(what, "market page");
                assert_eq!(waited, Duration::from_secs(1));
            }
            other => panic!("expected hydration timeout, got {other:?}"),
        }
        assert!(started.elapsed() <= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_stops_polling() {
        let calls = Cell::new(0);
        let result = wait_until(&policy(1000, 100), "page", || {
            calls.set(calls.get() + 1);
            async {
                Err(FetchError::WebDriver {
                    error: "invalid session id".to_string(),
                    message: "session deleted".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(FetchError::WebDriver { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_zero_interval_is_bumped() {
        assert_eq!(policy(1000, 0).interval(), Duration::from_millis(1));
    }
}
