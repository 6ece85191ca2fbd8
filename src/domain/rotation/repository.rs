//! Persistence contract for rotation records.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{RotationFilter, RotationRecord};
use crate::domain::error::Result;
use crate::domain::id::{KeyId, RotationId};

#[async_trait]
pub trait RotationRepository: Send + Sync + Debug {
    async fn create(&self, record: &RotationRecord) -> Result<()>;

    async fn get(&self, id: RotationId) -> Result<RotationRecord>;

    /// List rotation records matching the filter, newest first.
    async fn list(&self, filter: &RotationFilter) -> Result<Vec<RotationRecord>>;

    /// Records whose `grace_ends` falls after the given instant, ordered
    /// by `grace_ends` ascending.
    async fn list_pending_grace(&self, now: DateTime<Utc>) -> Result<Vec<RotationRecord>>;

    /// The most recent rotation record for a key.
    async fn latest_for_key(&self, key_id: KeyId) -> Result<RotationRecord>;
}
