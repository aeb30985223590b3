//! Retry/backoff wrapper for individual remote write calls.

use std::future::Future;
use std::time::Duration;

use hourbook_remote::{RemoteError, RemoteErrorKind};
use log::debug;
use tokio::time::sleep;

/// Maximum attempts for one create-or-update call.
const MAX_WRITE_ATTEMPTS: u32 = 3;
/// Base delay for rate-limit backoff; doubles per attempt (2s, 4s, 8s).
const RATE_LIMIT_BASE_DELAY_SECS: u64 = 2;
/// Fixed delay before retrying a generic (network/server) failure.
const GENERIC_RETRY_DELAY_SECS: u64 = 2;

/// Run one remote write with kind-specific retry behavior.
///
/// - rate limits back off exponentially and report "rate limit exceeded"
///   once attempts are exhausted;
/// - auth and validation failures are not transient and fail immediately;
/// - not-found is never retried: it is the orchestrator's signal for orphan
///   recovery (update) or a dead remote project (create);
/// - anything else retries after a fixed delay and reports "max retries
///   exceeded" on exhaustion.
pub async fn send_with_retry<T, F, Fut>(mut call: F) -> std::result::Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
{
    let mut attempt = 1u32;
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.kind() {
            RemoteErrorKind::Auth | RemoteErrorKind::Validation | RemoteErrorKind::NotFound => {
                return Err(err);
            }
            RemoteErrorKind::RateLimit => {
                if attempt >= MAX_WRITE_ATTEMPTS {
                    return Err(RemoteError::rate_limit(
                        "rate limit exceeded",
                        err.retry_after_secs(),
                    ));
                }
                let backoff = RATE_LIMIT_BASE_DELAY_SECS << (attempt - 1);
                let delay = err
                    .retry_after_secs()
                    .map(|hint| hint.max(backoff))
                    .unwrap_or(backoff);
                debug!(
                    "Rate limited on attempt {}/{}; backing off {}s",
                    attempt, MAX_WRITE_ATTEMPTS, delay
                );
                sleep(Duration::from_secs(delay)).await;
            }
            RemoteErrorKind::Network => {
                if attempt >= MAX_WRITE_ATTEMPTS {
                    return Err(RemoteError::network(format!("max retries exceeded: {}", err)));
                }
                debug!(
                    "Remote write failed on attempt {}/{}; retrying in {}s: {}",
                    attempt, MAX_WRITE_ATTEMPTS, GENERIC_RETRY_DELAY_SECS, err
                );
                sleep(Duration::from_secs(GENERIC_RETRY_DELAY_SECS)).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn failing_with(
        calls: &AtomicU32,
        make_err: impl Fn() -> RemoteError,
    ) -> std::result::Result<u64, RemoteError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(make_err())
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_backs_off_then_reports_exhaustion() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let err = send_with_retry(|| failing_with(&calls, || RemoteError::rate_limit("429", None)))
            .await
            .expect_err("exhaustion");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("rate limit exceeded"));
        // 2s after the first attempt, 4s after the second.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_honors_larger_retry_after_hint() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let _ = send_with_retry(|| {
            failing_with(&calls, || RemoteError::rate_limit("429", Some(10)))
        })
        .await;

        // Two waits of 10s each, instead of 2s + 4s.
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn validation_fails_fast_without_retry() {
        let calls = AtomicU32::new(0);
        let err = send_with_retry(|| failing_with(&calls, || RemoteError::validation("bad hours")))
            .await
            .expect_err("fail fast");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("bad hours"));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_fails_fast_without_retry() {
        let calls = AtomicU32::new(0);
        let _ = send_with_retry(|| failing_with(&calls, || RemoteError::auth("expired")))
            .await
            .expect_err("fail fast");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_surfaced_untouched() {
        let calls = AtomicU32::new(0);
        let err = send_with_retry(|| failing_with(&calls, || RemoteError::not_found("gone")))
            .await
            .expect_err("surfaced");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), RemoteErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_retry_then_report_max_retries() {
        let calls = AtomicU32::new(0);
        let err = send_with_retry(|| failing_with(&calls, || RemoteError::network("502")))
            .await
            .expect_err("exhaustion");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("max retries exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_on_retry() {
        let calls = AtomicU32::new(0);
        let result = send_with_retry(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(RemoteError::network("blip"))
                } else {
                    Ok(42_u64)
                }
            }
        })
        .await
        .expect("recovered");

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
