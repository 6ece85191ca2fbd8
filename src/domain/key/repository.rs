//! Persistence contract for API keys.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{Key, KeyFilter, KeyState};
use crate::domain::error::Result;
use crate::domain::id::{KeyId, PolicyId};

/// Repository trait every key backend must satisfy.
///
/// `create` must enforce system-wide uniqueness of `key_hash` by failing
/// the insert with a conflict error; `get_by_hash` is the hot-path lookup
/// and must be constant-time with respect to the number of stored keys.
#[async_trait]
pub trait KeyRepository: Send + Sync + Debug {
    /// Persist a new key, failing on a duplicate id or key hash.
    async fn create(&self, key: &Key) -> Result<()>;

    async fn get(&self, id: KeyId) -> Result<Key>;

    /// Look up a key by its hash fingerprint.
    async fn get_by_hash(&self, hash: &str) -> Result<Key>;

    /// Look up a key by its display coordinates (caller prefix + hint).
    async fn get_by_prefix(&self, prefix: &str, hint: &str) -> Result<Key>;

    /// Full-row replace of an existing key.
    async fn update(&self, key: &Key) -> Result<()>;

    async fn update_state(&self, id: KeyId, state: KeyState) -> Result<()>;

    async fn update_last_used(&self, id: KeyId, at: DateTime<Utc>) -> Result<()>;

    async fn delete(&self, id: KeyId) -> Result<()>;

    /// List keys matching the filter, newest first.
    async fn list(&self, filter: &KeyFilter) -> Result<Vec<Key>>;

    async fn count(&self, filter: &KeyFilter) -> Result<u64>;

    /// Active keys whose `expires_at` falls before the given instant.
    async fn list_expired(&self, before: DateTime<Utc>) -> Result<Vec<Key>>;

    async fn list_by_policy(&self, policy_id: PolicyId) -> Result<Vec<Key>>;

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<()>;
}
