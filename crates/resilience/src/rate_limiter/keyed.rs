//! One sliding window per caller key

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RateLimitPolicy, RateLimiter, SlidingWindow};
use crate::ResilienceResult;

/// Windows are created lazily on first use of a key.
///
/// Once the map grows past `prune_threshold` entries, keys whose window has
/// emptied are dropped on the next acquisition.
#[derive(Debug)]
pub struct KeyedSlidingWindow<K>
where
    K: Eq + Hash,
{
    policy: RateLimitPolicy,
    windows: DashMap<K, Arc<SlidingWindow>>,
    prune_threshold: usize,
}

impl<K> KeyedSlidingWindow<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: DashMap::new(),
            prune_threshold: 4096,
        }
    }

    #[must_use]
    pub fn with_prune_threshold(mut self, threshold: usize) -> Self {
        self.prune_threshold = threshold;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Admit one request for `key` without awaiting.
    pub fn try_acquire(&self, key: &K) -> ResilienceResult<()> {
        if self.windows.len() > self.prune_threshold {
            self.prune();
        }

        // Clone the Arc so no shard lock is held while the window is locked.
        let window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| Arc::new(SlidingWindow::from_policy(self.policy)))
            .clone();
        window.try_acquire()
    }

    /// Admissions currently counted for `key`.
    pub fn in_window(&self, key: &K) -> usize {
        self.windows
            .get(key)
            .map(|window| Arc::clone(&window))
            .map_or(0, |window| window.in_window())
    }

    /// Drop keys with nothing left in their window.
    pub fn prune(&self) {
        self.windows.retain(|_, window| window.in_window() > 0);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    pub fn clear(&self) {
        self.windows.clear();
    }
}

#[async_trait]
impl<K> RateLimiter for KeyedSlidingWindow<K>
where
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug,
{
    type Key = K;

    async fn acquire(&self, key: &K) -> ResilienceResult<()> {
        self.try_acquire(key)
    }

    async fn current_rate(&self, key: &K) -> usize {
        self.in_window(key)
    }

    async fn reset(&self) {
        self.clear();
    }
}
