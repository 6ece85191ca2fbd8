//! Persistence contract for key policies.

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{Policy, PolicyFilter};
use crate::domain::error::Result;
use crate::domain::id::PolicyId;

#[async_trait]
pub trait PolicyRepository: Send + Sync + Debug {
    /// Persist a new policy, failing on a duplicate `(tenant_id, name)`.
    async fn create(&self, policy: &Policy) -> Result<()>;

    async fn get(&self, id: PolicyId) -> Result<Policy>;

    /// Names are unique per tenant.
    async fn get_by_name(&self, tenant_id: &str, name: &str) -> Result<Policy>;

    async fn update(&self, policy: &Policy) -> Result<()>;

    async fn delete(&self, id: PolicyId) -> Result<()>;

    /// List policies matching the filter, newest first.
    async fn list(&self, filter: &PolicyFilter) -> Result<Vec<Policy>>;

    async fn count(&self, filter: &PolicyFilter) -> Result<u64>;
}
