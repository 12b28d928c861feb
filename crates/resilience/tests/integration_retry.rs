//! Retry behaviour under paused time

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use sluice_resilience::{FixedDelay, RetryStrategy};
use tokio::time::Instant;

#[derive(Debug, PartialEq)]
enum FakeError {
    Transport,
    Rejected,
}

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[tokio::test(start_paused = true)]
async fn three_transport_failures_give_up_after_backoff() {
    let retry = RetryStrategy::exponential(3).unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let result: Result<(), FakeError> = retry
        .execute_if(
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Transport)
                }
            },
            |e| *e == FakeError::Transport,
        )
        .await;

    assert_eq!(result, Err(FakeError::Transport));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 128 ms + 256 ms between the three attempts
    assert_eq!(started.elapsed(), Duration::from_millis(384));
}

#[tokio::test(start_paused = true)]
async fn success_on_second_attempt() {
    let retry = RetryStrategy::exponential(3).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let value = retry
        .execute(|| {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FakeError::Transport)
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_returns_immediately() {
    let retry = RetryStrategy::new(FixedDelay(Duration::from_secs(1)), 5).unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), FakeError> = retry
        .execute_if(
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FakeError::Rejected)
                }
            },
            |e| *e == FakeError::Transport,
        )
        .await;

    assert_eq!(result, Err(FakeError::Rejected));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
