//! Bounded backoff wrapper for outbound calls that can fail with a
//! "retry after N seconds" or "timed out" error.
//!
//! Grounded in `flood_control_protection.py`'s two decorators
//! (`protect_from_telegram_flood_control`, `protect_from_telegram_timeout`):
//! both retry a fixed number of times with a policy-specific wait, log a
//! monotonic "recovery id", and let the final attempt's error escape
//! uncaught. Modeled here as a higher-order function, `retry(policy, op)`,
//! instead of a decorator, since Rust has no decorator syntax to imitate.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::Settings;

static NEXT_RECOVERY_ID: AtomicU64 = AtomicU64::new(0);

/// What a retryable operation's error means for backoff purposes. An op
/// under [`RetryPolicy::FloodControl`] reports its suggested delay through
/// [`FloodControlError::retry_after`]; under [`RetryPolicy::Timeout`] the
/// wait is a fixed per-kind buffer instead.
pub trait FloodControlError {
    /// `Some(delay)` if this error means "retry after `delay`", else `None`
    /// (a non-retryable failure, which escapes immediately).
    fn retry_after(&self) -> Option<Duration>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    FloodControl,
    Timeout,
}

/// Optional upward channel a retry loop reports throttling through, if a
/// supervisor channel is available to report it on.
#[async_trait::async_trait]
pub trait FloodControlReporter: Send + Sync {
    async fn report_flood_control(&self, delay: Duration);
}

/// Run `op`, retrying per `policy` up to the configured bound. The final
/// attempt's error is returned rather than retried again — it escapes
/// uncaught to the caller.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    settings: &Settings,
    reporter: Option<&dyn FloodControlReporter>,
    mut op: F,
) -> Result<T, E>
where
    E: FloodControlError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_retries = match policy {
        RetryPolicy::FloodControl => settings.max_flood_control_retries,
        RetryPolicy::Timeout => settings.max_time_out_retries,
    };

    for attempt in 1..max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let recovery_id = NEXT_RECOVERY_ID.fetch_add(1, Ordering::Relaxed);
                let wait = match (policy, e.retry_after()) {
                    (RetryPolicy::FloodControl, Some(delay)) => {
                        if let Some(reporter) = reporter {
                            reporter.report_flood_control(delay).await;
                        }
                        delay + settings.flood_control_buffer_time()
                    }
                    (RetryPolicy::Timeout, _) => settings.time_out_buffer_time(),
                    (RetryPolicy::FloodControl, None) => {
                        // Not actually retryable under this policy; let it escape now.
                        return Err(e);
                    }
                };
                tracing::warn!(
                    recovery_id,
                    attempt,
                    max_retries,
                    "retrying after transient failure"
                );
                tokio::time::sleep(jittered(wait)).await;
            }
        }
    }

    // Final attempt: its error, if any, escapes uncaught.
    op().await
}

/// Add up to 10% random jitter on top of a computed wait, so a burst of
/// retrying callers doesn't all wake up and hammer the same endpoint at
/// once. The reported `retry_after`/buffer value itself is never jittered,
/// only the actual sleep.
fn jittered(wait: Duration) -> Duration {
    let extra = rand::random::<f64>() * 0.1 * wait.as_secs_f64();
    wait + Duration::from_secs_f64(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AOrdering};

    #[derive(Debug)]
    struct FlakyError(Option<Duration>);

    impl FloodControlError for FlakyError {
        fn retry_after(&self) -> Option<Duration> {
            self.0
        }
    }

    fn fast_settings() -> Settings {
        Settings {
            max_flood_control_retries: 3,
            max_time_out_retries: 3,
            flood_control_buffer_time_secs: 0.0,
            time_out_buffer_time_secs: 0.0,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_succeeds_without_retry() {
        let settings = fast_settings();
        let result: Result<i32, FlakyError> =
            retry(RetryPolicy::FloodControl, &settings, None, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let settings = fast_settings();
        let attempts = AtomicU32::new(0);
        let result: Result<i32, FlakyError> = retry(RetryPolicy::FloodControl, &settings, None, || {
            let n = attempts.fetch_add(1, AOrdering::Relaxed);
            async move {
                if n < 2 {
                    Err(FlakyError(Some(Duration::from_millis(1))))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(AOrdering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_escapes() {
        let settings = fast_settings();
        let attempts = AtomicU32::new(0);
        let result: Result<i32, FlakyError> = retry(RetryPolicy::FloodControl, &settings, None, || {
            attempts.fetch_add(1, AOrdering::Relaxed);
            async { Err(FlakyError(Some(Duration::from_millis(1)))) }
        })
        .await;
        assert!(result.is_err());
        // max_retries=3: two retried attempts inside the loop plus one final attempt.
        assert_eq!(attempts.load(AOrdering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_reports_flood_control_delay() {
        struct Recorder(std::sync::Mutex<Vec<Duration>>);
        #[async_trait::async_trait]
        impl FloodControlReporter for Recorder {
            async fn report_flood_control(&self, delay: Duration) {
                self.0.lock().unwrap().push(delay);
            }
        }

        let settings = fast_settings();
        let recorder = Recorder(std::sync::Mutex::new(Vec::new()));
        let attempts = AtomicU32::new(0);
        let _: Result<i32, FlakyError> = retry(RetryPolicy::FloodControl, &settings, Some(&recorder), || {
            let n = attempts.fetch_add(1, AOrdering::Relaxed);
            async move {
                if n == 0 {
                    Err(FlakyError(Some(Duration::from_millis(5))))
                } else {
                    Ok(1)
                }
            }
        })
        .await;

        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
