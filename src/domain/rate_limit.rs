//! Rate-limiting contract.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::Result;

/// Windowed admission decision per bucket.
///
/// The engine passes the key id as the bucket. The windowing algorithm
/// (fixed window, sliding window, token bucket) is the implementer's
/// choice; the engine relies only on `allow` returning `false` meaning
/// the bucket is currently over the limit.
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    /// Whether one more request fits within the limit, recording it if so.
    async fn allow(&self, bucket: &str, limit: u32, window: Duration) -> Result<bool>;

    /// Requests left in the current window.
    async fn remaining(&self, bucket: &str, limit: u32, window: Duration) -> Result<u32>;
}
