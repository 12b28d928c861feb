//! Integration tests for the sliding-window limiters

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sluice_resilience::{
    KeyedSlidingWindow, RateLimitPolicy, RateLimiter, ResilienceError, SlidingWindow,
};

#[tokio::test(start_paused = true)]
async fn thirty_first_request_in_window_is_rejected() {
    let limiter = SlidingWindow::from_policy(RateLimitPolicy::execute());

    for _ in 0..30 {
        assert!(limiter.acquire(&()).await.is_ok());
    }

    let err = limiter.acquire(&()).await.unwrap_err();
    match err {
        ResilienceError::RateLimitExceeded {
            limit,
            current,
            retry_after,
            ..
        } => {
            assert_eq!(limit, 30);
            assert_eq!(current, 30);
            assert_eq!(retry_after, Some(Duration::from_secs(10)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn window_slides_forward() {
    let limiter = SlidingWindow::new(Duration::from_millis(100), 5);

    for _ in 0..5 {
        assert!(limiter.acquire(&()).await.is_ok());
    }
    assert!(limiter.acquire(&()).await.is_err());

    tokio::time::advance(Duration::from_millis(110)).await;

    assert_eq!(limiter.current_rate(&()).await, 0);
    assert!(limiter.acquire(&()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn partially_expired_window_frees_only_old_slots() {
    let limiter = SlidingWindow::new(Duration::from_secs(10), 3);

    limiter.acquire(&()).await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    limiter.acquire(&()).await.unwrap();
    limiter.acquire(&()).await.unwrap();
    assert!(limiter.acquire(&()).await.is_err());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(limiter.current_rate(&()).await, 2);
    assert!(limiter.acquire(&()).await.is_ok());
    assert!(limiter.acquire(&()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn reset_clears_admissions() {
    let limiter = SlidingWindow::new(Duration::from_secs(60), 1);
    limiter.acquire(&()).await.unwrap();
    limiter.reset().await;
    assert!(limiter.acquire(&()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn keys_are_limited_independently() {
    let limiter: Arc<dyn RateLimiter<Key = String>> = Arc::new(KeyedSlidingWindow::new(
        RateLimitPolicy::new(3, Duration::from_secs(60)),
    ));
    let (a, b) = ("caller-a".to_string(), "caller-b".to_string());

    for _ in 0..3 {
        limiter.acquire(&a).await.unwrap();
    }
    assert!(limiter.acquire(&a).await.is_err());
    assert!(limiter.acquire(&b).await.is_ok());
    assert_eq!(limiter.current_rate(&a).await, 3);
    assert_eq!(limiter.current_rate(&"unknown".to_string()).await, 0);

    limiter.reset().await;
    assert!(limiter.acquire(&a).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn idle_keys_are_pruned() {
    let limiter = KeyedSlidingWindow::new(RateLimitPolicy::new(1, Duration::from_secs(1)))
        .with_prune_threshold(2);

    for key in ["a", "b", "c"] {
        limiter.try_acquire(&key).unwrap();
    }
    assert_eq!(limiter.tracked_keys(), 3);

    tokio::time::advance(Duration::from_secs(2)).await;
    limiter.try_acquire(&"d").unwrap();
    assert_eq!(limiter.tracked_keys(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquisitions_never_exceed_limit() {
    let limiter = Arc::new(KeyedSlidingWindow::new(RateLimitPolicy::new(
        30,
        Duration::from_secs(60),
    )));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.try_acquire(&"shared").is_ok() })
        })
        .collect();

    let admitted = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(true)))
        .count();

    assert_eq!(admitted, 30);
}
