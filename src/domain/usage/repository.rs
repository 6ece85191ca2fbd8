//! Persistence contract for usage tracking.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::record::{UsageAggregation, UsageFilter, UsageRecord};
use crate::domain::error::Result;
use crate::domain::id::KeyId;

#[async_trait]
pub trait UsageRepository: Send + Sync + Debug {
    async fn record(&self, record: &UsageRecord) -> Result<()>;

    async fn record_batch(&self, records: &[UsageRecord]) -> Result<()>;

    /// Query raw usage records matching the filter, newest first.
    async fn query(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>>;

    /// Read pre-computed aggregation rows. Computing them is out of
    /// scope for the engine.
    async fn aggregate(&self, filter: &UsageFilter) -> Result<Vec<UsageAggregation>>;

    async fn count(&self, filter: &UsageFilter) -> Result<u64>;

    /// Delete records older than the given instant; returns how many
    /// were removed.
    async fn purge(&self, before: DateTime<Utc>) -> Result<u64>;

    /// Requests recorded for a key on the given calendar day (UTC).
    async fn daily_count(&self, key_id: KeyId, date: DateTime<Utc>) -> Result<u64>;

    /// Requests recorded for a key in the given calendar month (UTC).
    async fn monthly_count(&self, key_id: KeyId, month: DateTime<Utc>) -> Result<u64>;
}
