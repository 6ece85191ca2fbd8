//! Sliding-window in-memory rate limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::Result;
use crate::domain::rate_limit::RateLimiter;

/// Request timestamps older than this are dropped wholesale during
/// cleanup; no supported window exceeds a day.
const CLEANUP_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Keeps a per-bucket log of request instants and admits a request when
/// fewer than `limit` instants fall inside the trailing window.
#[derive(Debug)]
pub struct MemoryRateLimiter {
    buckets: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    cleanup_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            cleanup_interval: Duration::from_secs(300),
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    /// Forget all recorded requests for a bucket.
    pub async fn reset(&self, bucket: &str) {
        let mut buckets = self.buckets.write().await;
        buckets.remove(bucket);
    }

    async fn maybe_cleanup(&self) {
        let due = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };
        if !due {
            return;
        }

        let mut last = self.last_cleanup.write().await;
        *last = Instant::now();

        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        for hits in buckets.values_mut() {
            hits.retain(|t| now.duration_since(*t) < CLEANUP_HORIZON);
        }
        buckets.retain(|_, hits| !hits.is_empty());
    }
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn allow(&self, bucket: &str, limit: u32, window: Duration) -> Result<bool> {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let hits = buckets.entry(bucket.to_string()).or_default();
        hits.retain(|t| now.duration_since(*t) < window);

        if hits.len() as u32 >= limit {
            return Ok(false);
        }
        hits.push(now);
        Ok(true)
    }

    async fn remaining(&self, bucket: &str, limit: u32, window: Duration) -> Result<u32> {
        let now = Instant::now();
        let buckets = self.buckets.read().await;
        let in_window = buckets
            .get(bucket)
            .map(|hits| {
                hits.iter()
                    .filter(|t| now.duration_since(**t) < window)
                    .count() as u32
            })
            .unwrap_or(0);
        Ok(limit.saturating_sub(in_window))
    }
}
