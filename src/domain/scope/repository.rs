//! Persistence contract for permission scopes and the key↔scope junction.

use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{Scope, ScopeFilter};
use crate::domain::error::Result;
use crate::domain::id::{KeyId, ScopeId};

#[async_trait]
pub trait ScopeRepository: Send + Sync + Debug {
    /// Persist a new scope, failing on a duplicate `(tenant_id, name)`.
    async fn create(&self, scope: &Scope) -> Result<()>;

    async fn get(&self, id: ScopeId) -> Result<Scope>;

    /// Names are unique per tenant.
    async fn get_by_name(&self, tenant_id: &str, name: &str) -> Result<Scope>;

    async fn update(&self, scope: &Scope) -> Result<()>;

    async fn delete(&self, id: ScopeId) -> Result<()>;

    /// List scopes matching the filter, ordered by name ascending.
    async fn list(&self, filter: &ScopeFilter) -> Result<Vec<Scope>>;

    /// Scopes assigned to the key, ordered by name ascending.
    async fn list_by_key(&self, key_id: KeyId) -> Result<Vec<Scope>>;

    /// Attach scopes to a key by name. Names resolve through the key's
    /// tenant; an unknown name fails the call with `ScopeNotFound`.
    /// Re-assigning an already-attached scope is a no-op.
    async fn assign_to_key(&self, key_id: KeyId, scope_names: &[String]) -> Result<()>;

    /// Detach scopes from a key by name. Absent names are ignored.
    async fn remove_from_key(&self, key_id: KeyId, scope_names: &[String]) -> Result<()>;
}
