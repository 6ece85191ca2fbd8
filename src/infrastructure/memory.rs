//! Reference in-memory store backend.
//!
//! Keeps every table behind a single `RwLock`, which gives the
//! store-level atomicity the engine relies on: concurrent creates with a
//! colliding hash resolve to one success and one conflict, and a state
//! update is visible to every subsequent lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::sync::RwLock;

use crate::domain::error::{Error, Result};
use crate::domain::id::{KeyId, PolicyId, RotationId, ScopeId};
use crate::domain::key::{Key, KeyFilter, KeyRepository, KeyState};
use crate::domain::policy::{Policy, PolicyFilter, PolicyRepository};
use crate::domain::rotation::{RotationFilter, RotationRecord, RotationRepository};
use crate::domain::scope::{Scope, ScopeFilter, ScopeRepository};
use crate::domain::store::Store;
use crate::domain::usage::{UsageAggregation, UsageFilter, UsageRecord, UsageRepository};

#[derive(Debug, Default)]
struct Shared {
    /// key id -> Key
    keys: HashMap<String, Key>,
    /// key_hash -> key id. Gives the hot path its constant-time lookup
    /// and enforces hash uniqueness at insert.
    hash_index: HashMap<String, String>,
    /// policy id -> Policy
    policies: HashMap<String, Policy>,
    /// scope id -> Scope
    scopes: HashMap<String, Scope>,
    /// key id -> set of scope ids (the key↔scope junction)
    key_scopes: HashMap<String, BTreeSet<String>>,
    /// append-only usage log
    usages: Vec<UsageRecord>,
    /// pre-computed aggregation rows, owned by an external aggregator
    aggregations: Vec<UsageAggregation>,
    /// rotation id -> RotationRecord
    rotations: HashMap<String, RotationRecord>,
}

/// In-memory [`Store`] for tests and embedded deployments.
#[derive(Debug)]
pub struct MemoryStore {
    keys: MemoryKeyRepository,
    policies: MemoryPolicyRepository,
    scopes: MemoryScopeRepository,
    usages: MemoryUsageRepository,
    rotations: MemoryRotationRepository,
}

impl MemoryStore {
    pub fn new() -> Self {
        let shared = Arc::new(RwLock::new(Shared::default()));
        Self {
            keys: MemoryKeyRepository {
                shared: Arc::clone(&shared),
            },
            policies: MemoryPolicyRepository {
                shared: Arc::clone(&shared),
            },
            scopes: MemoryScopeRepository {
                shared: Arc::clone(&shared),
            },
            usages: MemoryUsageRepository {
                shared: Arc::clone(&shared),
            },
            rotations: MemoryRotationRepository { shared },
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {

    /// Load pre-computed aggregation rows, standing in for the external
    /// batch aggregator that owns the table.
    pub async fn load_aggregations(&self, rows: Vec<UsageAggregation>) {
        let mut shared = self.usages.shared.write().await;
        shared.aggregations.extend(rows);
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn keys(&self) -> &dyn KeyRepository {
        &self.keys
    }

    fn policies(&self) -> &dyn PolicyRepository {
        &self.policies
    }

    fn scopes(&self) -> &dyn ScopeRepository {
        &self.scopes
    }

    fn usages(&self) -> &dyn UsageRepository {
        &self.usages
    }

    fn rotations(&self) -> &dyn RotationRepository {
        &self.rotations
    }

    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    let offset = offset.max(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    let mut items: Vec<T> = items.into_iter().skip(offset).collect();
    if limit > 0 && (limit as usize) < items.len() {
        items.truncate(limit as usize);
    }
    items
}

// ── Keys ──────────────────────────────────────────

#[derive(Debug)]
struct MemoryKeyRepository {
    shared: Arc<RwLock<Shared>>,
}

fn match_key_filter(key: &Key, filter: &KeyFilter) -> bool {
    if let Some(tenant_id) = &filter.tenant_id {
        if &key.tenant_id != tenant_id {
            return false;
        }
    }
    if let Some(environment) = filter.environment {
        if key.environment != environment {
            return false;
        }
    }
    if let Some(state) = filter.state {
        if key.state != state {
            return false;
        }
    }
    if let Some(policy_id) = filter.policy_id {
        if key.policy_id != Some(policy_id) {
            return false;
        }
    }
    if let Some(created_by) = &filter.created_by {
        if key.created_by.as_ref() != Some(created_by) {
            return false;
        }
    }
    true
}

#[async_trait]
impl KeyRepository for MemoryKeyRepository {
    async fn create(&self, key: &Key) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = key.id.to_string();

        if shared.keys.contains_key(&id) {
            return Err(Error::conflict(format!("key {id} already exists")));
        }
        if shared.hash_index.contains_key(&key.key_hash) {
            return Err(Error::conflict("key hash already exists"));
        }

        shared.hash_index.insert(key.key_hash.clone(), id.clone());
        shared.keys.insert(id, key.clone());
        Ok(())
    }

    async fn get(&self, id: KeyId) -> Result<Key> {
        let shared = self.shared.read().await;
        shared
            .keys
            .get(&id.to_string())
            .cloned()
            .ok_or(Error::KeyNotFound)
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Key> {
        let shared = self.shared.read().await;
        let id = shared.hash_index.get(hash).ok_or(Error::KeyNotFound)?;
        shared.keys.get(id).cloned().ok_or(Error::KeyNotFound)
    }

    async fn get_by_prefix(&self, prefix: &str, hint: &str) -> Result<Key> {
        let shared = self.shared.read().await;
        shared
            .keys
            .values()
            .find(|k| k.prefix == prefix && k.hint == hint)
            .cloned()
            .ok_or(Error::KeyNotFound)
    }

    async fn update(&self, key: &Key) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = key.id.to_string();

        let old_hash = match shared.keys.get(&id) {
            Some(existing) => existing.key_hash.clone(),
            None => return Err(Error::KeyNotFound),
        };

        if old_hash != key.key_hash {
            shared.hash_index.remove(&old_hash);
            shared.hash_index.insert(key.key_hash.clone(), id.clone());
        }
        shared.keys.insert(id, key.clone());
        Ok(())
    }

    async fn update_state(&self, id: KeyId, state: KeyState) -> Result<()> {
        let mut shared = self.shared.write().await;
        let key = shared
            .keys
            .get_mut(&id.to_string())
            .ok_or(Error::KeyNotFound)?;
        key.state = state;
        key.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_used(&self, id: KeyId, at: DateTime<Utc>) -> Result<()> {
        let mut shared = self.shared.write().await;
        let key = shared
            .keys
            .get_mut(&id.to_string())
            .ok_or(Error::KeyNotFound)?;
        key.last_used_at = Some(at);
        Ok(())
    }

    async fn delete(&self, id: KeyId) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = id.to_string();
        let key = shared.keys.remove(&id).ok_or(Error::KeyNotFound)?;
        shared.hash_index.remove(&key.key_hash);
        shared.key_scopes.remove(&id);
        Ok(())
    }

    async fn list(&self, filter: &KeyFilter) -> Result<Vec<Key>> {
        let shared = self.shared.read().await;
        let mut result: Vec<Key> = shared
            .keys
            .values()
            .filter(|k| match_key_filter(k, filter))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn count(&self, filter: &KeyFilter) -> Result<u64> {
        let shared = self.shared.read().await;
        Ok(shared
            .keys
            .values()
            .filter(|k| match_key_filter(k, filter))
            .count() as u64)
    }

    async fn list_expired(&self, before: DateTime<Utc>) -> Result<Vec<Key>> {
        let shared = self.shared.read().await;
        Ok(shared
            .keys
            .values()
            .filter(|k| {
                k.state == KeyState::Active && k.expires_at.is_some_and(|at| at < before)
            })
            .cloned()
            .collect())
    }

    async fn list_by_policy(&self, policy_id: PolicyId) -> Result<Vec<Key>> {
        let shared = self.shared.read().await;
        Ok(shared
            .keys
            .values()
            .filter(|k| k.policy_id == Some(policy_id))
            .cloned()
            .collect())
    }

    async fn delete_by_tenant(&self, tenant_id: &str) -> Result<()> {
        let mut shared = self.shared.write().await;
        let doomed: Vec<String> = shared
            .keys
            .iter()
            .filter(|(_, k)| k.tenant_id == tenant_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in doomed {
            if let Some(key) = shared.keys.remove(&id) {
                shared.hash_index.remove(&key.key_hash);
            }
            shared.key_scopes.remove(&id);
        }
        Ok(())
    }
}

// ── Policies ──────────────────────────────────────

#[derive(Debug)]
struct MemoryPolicyRepository {
    shared: Arc<RwLock<Shared>>,
}

#[async_trait]
impl PolicyRepository for MemoryPolicyRepository {
    async fn create(&self, policy: &Policy) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = policy.id.to_string();

        if shared.policies.contains_key(&id) {
            return Err(Error::conflict(format!("policy {id} already exists")));
        }
        if shared
            .policies
            .values()
            .any(|p| p.tenant_id == policy.tenant_id && p.name == policy.name)
        {
            return Err(Error::conflict(format!(
                "policy name {:?} already exists for tenant",
                policy.name
            )));
        }

        shared.policies.insert(id, policy.clone());
        Ok(())
    }

    async fn get(&self, id: PolicyId) -> Result<Policy> {
        let shared = self.shared.read().await;
        shared
            .policies
            .get(&id.to_string())
            .cloned()
            .ok_or(Error::PolicyNotFound)
    }

    async fn get_by_name(&self, tenant_id: &str, name: &str) -> Result<Policy> {
        let shared = self.shared.read().await;
        shared
            .policies
            .values()
            .find(|p| p.tenant_id == tenant_id && p.name == name)
            .cloned()
            .ok_or(Error::PolicyNotFound)
    }

    async fn update(&self, policy: &Policy) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = policy.id.to_string();
        if !shared.policies.contains_key(&id) {
            return Err(Error::PolicyNotFound);
        }
        shared.policies.insert(id, policy.clone());
        Ok(())
    }

    async fn delete(&self, id: PolicyId) -> Result<()> {
        let mut shared = self.shared.write().await;
        shared
            .policies
            .remove(&id.to_string())
            .map(|_| ())
            .ok_or(Error::PolicyNotFound)
    }

    async fn list(&self, filter: &PolicyFilter) -> Result<Vec<Policy>> {
        let shared = self.shared.read().await;
        let mut result: Vec<Policy> = shared
            .policies
            .values()
            .filter(|p| {
                filter
                    .tenant_id
                    .as_ref()
                    .is_none_or(|tenant| &p.tenant_id == tenant)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn count(&self, filter: &PolicyFilter) -> Result<u64> {
        let shared = self.shared.read().await;
        Ok(shared
            .policies
            .values()
            .filter(|p| {
                filter
                    .tenant_id
                    .as_ref()
                    .is_none_or(|tenant| &p.tenant_id == tenant)
            })
            .count() as u64)
    }
}

// ── Scopes ────────────────────────────────────────

#[derive(Debug)]
struct MemoryScopeRepository {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryScopeRepository {
    /// Resolve scope names to ids through the owning key's tenant.
    /// Used by both junction operations; assignment fails on the first
    /// name the tenant does not define.
    fn resolve_names(
        shared: &Shared,
        key_id: &KeyId,
        scope_names: &[String],
        strict: bool,
    ) -> Result<Vec<String>> {
        let key = shared
            .keys
            .get(&key_id.to_string())
            .ok_or(Error::KeyNotFound)?;

        let mut ids = Vec::with_capacity(scope_names.len());
        for name in scope_names {
            let found = shared
                .scopes
                .values()
                .find(|s| s.tenant_id == key.tenant_id && &s.name == name);
            match found {
                Some(scope) => ids.push(scope.id.to_string()),
                None if strict => return Err(Error::ScopeNotFound),
                None => {}
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl ScopeRepository for MemoryScopeRepository {
    async fn create(&self, scope: &Scope) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = scope.id.to_string();

        if shared.scopes.contains_key(&id) {
            return Err(Error::conflict(format!("scope {id} already exists")));
        }
        if shared
            .scopes
            .values()
            .any(|s| s.tenant_id == scope.tenant_id && s.name == scope.name)
        {
            return Err(Error::conflict(format!(
                "scope name {:?} already exists for tenant",
                scope.name
            )));
        }

        shared.scopes.insert(id, scope.clone());
        Ok(())
    }

    async fn get(&self, id: ScopeId) -> Result<Scope> {
        let shared = self.shared.read().await;
        shared
            .scopes
            .get(&id.to_string())
            .cloned()
            .ok_or(Error::ScopeNotFound)
    }

    async fn get_by_name(&self, tenant_id: &str, name: &str) -> Result<Scope> {
        let shared = self.shared.read().await;
        shared
            .scopes
            .values()
            .find(|s| s.tenant_id == tenant_id && s.name == name)
            .cloned()
            .ok_or(Error::ScopeNotFound)
    }

    async fn update(&self, scope: &Scope) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = scope.id.to_string();
        if !shared.scopes.contains_key(&id) {
            return Err(Error::ScopeNotFound);
        }
        shared.scopes.insert(id, scope.clone());
        Ok(())
    }

    async fn delete(&self, id: ScopeId) -> Result<()> {
        let mut shared = self.shared.write().await;
        let id = id.to_string();
        shared.scopes.remove(&id).ok_or(Error::ScopeNotFound)?;
        for assigned in shared.key_scopes.values_mut() {
            assigned.remove(&id);
        }
        Ok(())
    }

    async fn list(&self, filter: &ScopeFilter) -> Result<Vec<Scope>> {
        let shared = self.shared.read().await;
        let mut result: Vec<Scope> = shared
            .scopes
            .values()
            .filter(|s| {
                filter
                    .tenant_id
                    .as_ref()
                    .is_none_or(|tenant| &s.tenant_id == tenant)
                    && filter
                        .parent
                        .as_ref()
                        .is_none_or(|parent| s.parent.as_ref() == Some(parent))
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn list_by_key(&self, key_id: KeyId) -> Result<Vec<Scope>> {
        let shared = self.shared.read().await;
        let assigned = match shared.key_scopes.get(&key_id.to_string()) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        let mut result: Vec<Scope> = assigned
            .iter()
            .filter_map(|id| shared.scopes.get(id).cloned())
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn assign_to_key(&self, key_id: KeyId, scope_names: &[String]) -> Result<()> {
        let mut shared = self.shared.write().await;
        let ids = Self::resolve_names(&shared, &key_id, scope_names, true)?;
        let assigned = shared.key_scopes.entry(key_id.to_string()).or_default();
        for id in ids {
            assigned.insert(id);
        }
        Ok(())
    }

    async fn remove_from_key(&self, key_id: KeyId, scope_names: &[String]) -> Result<()> {
        let mut shared = self.shared.write().await;
        let ids = Self::resolve_names(&shared, &key_id, scope_names, false)?;
        if let Some(assigned) = shared.key_scopes.get_mut(&key_id.to_string()) {
            for id in &ids {
                assigned.remove(id);
            }
        }
        Ok(())
    }
}

// ── Usage ─────────────────────────────────────────

#[derive(Debug)]
struct MemoryUsageRepository {
    shared: Arc<RwLock<Shared>>,
}

fn match_usage_filter(record: &UsageRecord, filter: &UsageFilter) -> bool {
    if let Some(key_id) = filter.key_id {
        if record.key_id != key_id {
            return false;
        }
    }
    if let Some(tenant_id) = &filter.tenant_id {
        if &record.tenant_id != tenant_id {
            return false;
        }
    }
    if let Some(after) = filter.after {
        if record.created_at < after {
            return false;
        }
    }
    if let Some(before) = filter.before {
        if record.created_at > before {
            return false;
        }
    }
    true
}

#[async_trait]
impl UsageRepository for MemoryUsageRepository {
    async fn record(&self, record: &UsageRecord) -> Result<()> {
        let mut shared = self.shared.write().await;
        shared.usages.push(record.clone());
        Ok(())
    }

    async fn record_batch(&self, records: &[UsageRecord]) -> Result<()> {
        let mut shared = self.shared.write().await;
        shared.usages.extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>> {
        let shared = self.shared.read().await;
        let mut result: Vec<UsageRecord> = shared
            .usages
            .iter()
            .filter(|r| match_usage_filter(r, filter))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn aggregate(&self, filter: &UsageFilter) -> Result<Vec<UsageAggregation>> {
        let shared = self.shared.read().await;
        Ok(shared
            .aggregations
            .iter()
            .filter(|a| {
                filter.key_id.is_none_or(|key_id| a.key_id == key_id)
                    && filter
                        .tenant_id
                        .as_ref()
                        .is_none_or(|tenant| &a.tenant_id == tenant)
                    && filter
                        .period
                        .as_ref()
                        .is_none_or(|period| &a.period == period)
            })
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &UsageFilter) -> Result<u64> {
        let shared = self.shared.read().await;
        Ok(shared
            .usages
            .iter()
            .filter(|r| match_usage_filter(r, filter))
            .count() as u64)
    }

    async fn purge(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut shared = self.shared.write().await;
        let initial = shared.usages.len();
        shared.usages.retain(|r| r.created_at >= before);
        Ok((initial - shared.usages.len()) as u64)
    }

    async fn daily_count(&self, key_id: KeyId, date: DateTime<Utc>) -> Result<u64> {
        let shared = self.shared.read().await;
        Ok(shared
            .usages
            .iter()
            .filter(|r| r.key_id == key_id && r.created_at.date_naive() == date.date_naive())
            .count() as u64)
    }

    async fn monthly_count(&self, key_id: KeyId, month: DateTime<Utc>) -> Result<u64> {
        let shared = self.shared.read().await;
        Ok(shared
            .usages
            .iter()
            .filter(|r| {
                r.key_id == key_id
                    && r.created_at.year() == month.year()
                    && r.created_at.month() == month.month()
            })
            .count() as u64)
    }
}

// ── Rotations ─────────────────────────────────────

#[derive(Debug)]
struct MemoryRotationRepository {
    shared: Arc<RwLock<Shared>>,
}

fn match_rotation_filter(record: &RotationRecord, filter: &RotationFilter) -> bool {
    if let Some(key_id) = filter.key_id {
        if record.key_id != key_id {
            return false;
        }
    }
    if let Some(tenant_id) = &filter.tenant_id {
        if &record.tenant_id != tenant_id {
            return false;
        }
    }
    if let Some(reason) = filter.reason {
        if record.reason != reason {
            return false;
        }
    }
    true
}

#[async_trait]
impl RotationRepository for MemoryRotationRepository {
    async fn create(&self, record: &RotationRecord) -> Result<()> {
        let mut shared = self.shared.write().await;
        shared.rotations.insert(record.id.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, id: RotationId) -> Result<RotationRecord> {
        let shared = self.shared.read().await;
        shared
            .rotations
            .get(&id.to_string())
            .cloned()
            .ok_or(Error::RotationNotFound)
    }

    async fn list(&self, filter: &RotationFilter) -> Result<Vec<RotationRecord>> {
        let shared = self.shared.read().await;
        let mut result: Vec<RotationRecord> = shared
            .rotations
            .values()
            .filter(|r| match_rotation_filter(r, filter))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn list_pending_grace(&self, now: DateTime<Utc>) -> Result<Vec<RotationRecord>> {
        let shared = self.shared.read().await;
        let mut result: Vec<RotationRecord> = shared
            .rotations
            .values()
            .filter(|r| r.grace_ends > now)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.grace_ends.cmp(&b.grace_ends));
        Ok(result)
    }

    async fn latest_for_key(&self, key_id: KeyId) -> Result<RotationRecord> {
        let shared = self.shared.read().await;
        shared
            .rotations
            .values()
            .filter(|r| r.key_id == key_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned()
            .ok_or(Error::RotationNotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::domain::id::Id;
    use crate::domain::key::Environment;
    use crate::domain::rotation::RotationReason;

    fn test_key(tenant: &str, name: &str, hash: &str) -> Key {
        let now = Utc::now();
        Key {
            id: Id::new_key(),
            tenant_id: tenant.into(),
            app_id: "app_test".into(),
            name: name.into(),
            description: None,
            prefix: "sk".into(),
            hint: "0000".into(),
            key_hash: hash.into(),
            environment: Environment::Test,
            state: KeyState::Active,
            policy_id: None,
            scopes: Vec::new(),
            metadata: HashMap::new(),
            created_by: None,
            expires_at: None,
            last_used_at: None,
            rotated_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_scope(tenant: &str, name: &str) -> Scope {
        let mut scope = Scope::new(name);
        scope.tenant_id = tenant.into();
        scope
    }

    fn test_rotation(key_id: KeyId, grace_ends: DateTime<Utc>) -> RotationRecord {
        RotationRecord {
            id: Id::new_rotation(),
            key_id,
            tenant_id: "t1".into(),
            old_key_hash: "old".into(),
            new_key_hash: "new".into(),
            reason: RotationReason::Manual,
            grace_ttl: Duration::from_secs(3600),
            grace_ends,
            rotated_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_key_create_and_get() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "hash-1");

        store.keys().create(&key).await.unwrap();

        let found = store.keys().get(key.id).await.unwrap();
        assert_eq!(found.name, "K");
        assert_eq!(found.key_hash, "hash-1");
    }

    #[tokio::test]
    async fn test_key_get_by_hash() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "hash-1");
        store.keys().create(&key).await.unwrap();

        let found = store.keys().get_by_hash("hash-1").await.unwrap();
        assert_eq!(found.id, key.id);

        let err = store.keys().get_by_hash("missing").await.unwrap_err();
        assert!(matches!(err, Error::KeyNotFound));
    }

    #[tokio::test]
    async fn test_duplicate_hash_conflicts() {
        let store = MemoryStore::new();
        store.keys().create(&test_key("t1", "A", "same-hash")).await.unwrap();

        let err = store
            .keys()
            .create(&test_key("t2", "B", "same-hash"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_key_get_by_prefix() {
        let store = MemoryStore::new();
        let mut key = test_key("t1", "K", "hash-1");
        key.hint = "a3f4".into();
        store.keys().create(&key).await.unwrap();

        let found = store.keys().get_by_prefix("sk", "a3f4").await.unwrap();
        assert_eq!(found.id, key.id);

        assert!(store.keys().get_by_prefix("sk", "0000").await.is_err());
    }

    #[tokio::test]
    async fn test_key_update_moves_hash_index() {
        let store = MemoryStore::new();
        let mut key = test_key("t1", "K", "hash-old");
        store.keys().create(&key).await.unwrap();

        key.key_hash = "hash-new".into();
        store.keys().update(&key).await.unwrap();

        assert!(store.keys().get_by_hash("hash-old").await.is_err());
        let found = store.keys().get_by_hash("hash-new").await.unwrap();
        assert_eq!(found.id, key.id);
    }

    #[tokio::test]
    async fn test_key_update_state() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "hash-1");
        store.keys().create(&key).await.unwrap();

        store
            .keys()
            .update_state(key.id, KeyState::Suspended)
            .await
            .unwrap();

        let found = store.keys().get(key.id).await.unwrap();
        assert_eq!(found.state, KeyState::Suspended);
        assert!(found.updated_at >= key.updated_at);
    }

    #[tokio::test]
    async fn test_key_update_last_used() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "hash-1");
        store.keys().create(&key).await.unwrap();

        let at = Utc::now();
        store.keys().update_last_used(key.id, at).await.unwrap();

        let found = store.keys().get(key.id).await.unwrap();
        assert_eq!(found.last_used_at, Some(at));
    }

    #[tokio::test]
    async fn test_key_delete() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "hash-1");
        store.keys().create(&key).await.unwrap();

        store.keys().delete(key.id).await.unwrap();

        assert!(store.keys().get(key.id).await.is_err());
        assert!(store.keys().get_by_hash("hash-1").await.is_err());
    }

    #[tokio::test]
    async fn test_key_list_filters_by_tenant_and_state() {
        let store = MemoryStore::new();
        store.keys().create(&test_key("t1", "A", "h1")).await.unwrap();
        store.keys().create(&test_key("t1", "B", "h2")).await.unwrap();
        store.keys().create(&test_key("t2", "C", "h3")).await.unwrap();

        let tenant1 = store
            .keys()
            .list(&KeyFilter::for_tenant("t1"))
            .await
            .unwrap();
        assert_eq!(tenant1.len(), 2);

        let suspended = store
            .keys()
            .list(&KeyFilter::for_tenant("t1").with_state(KeyState::Suspended))
            .await
            .unwrap();
        assert!(suspended.is_empty());
    }

    #[tokio::test]
    async fn test_key_list_pagination_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut key = test_key("t1", &format!("K{i}"), &format!("h{i}"));
            key.created_at = Utc::now() + chrono::Duration::milliseconds(i);
            store.keys().create(&key).await.unwrap();
        }

        let page = store
            .keys()
            .list(&KeyFilter::for_tenant("t1").with_page(1, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "K3");
        assert_eq!(page[1].name, "K2");

        let beyond = store
            .keys()
            .list(&KeyFilter::for_tenant("t1").with_page(10, 2))
            .await
            .unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_key_count() {
        let store = MemoryStore::new();
        store.keys().create(&test_key("t1", "A", "h1")).await.unwrap();
        store.keys().create(&test_key("t2", "B", "h2")).await.unwrap();

        assert_eq!(store.keys().count(&KeyFilter::default()).await.unwrap(), 2);
        assert_eq!(
            store.keys().count(&KeyFilter::for_tenant("t1")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_key_list_expired_only_active() {
        let store = MemoryStore::new();
        let past = Utc::now() - chrono::Duration::hours(1);

        let mut expired = test_key("t1", "Expired", "h1");
        expired.expires_at = Some(past);
        store.keys().create(&expired).await.unwrap();

        let mut revoked = test_key("t1", "Revoked", "h2");
        revoked.expires_at = Some(past);
        revoked.state = KeyState::Revoked;
        store.keys().create(&revoked).await.unwrap();

        let fresh = test_key("t1", "Fresh", "h3");
        store.keys().create(&fresh).await.unwrap();

        let found = store.keys().list_expired(Utc::now()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Expired");
    }

    #[tokio::test]
    async fn test_key_list_by_policy() {
        let store = MemoryStore::new();
        let policy_id = Id::new_policy();

        let mut bound = test_key("t1", "Bound", "h1");
        bound.policy_id = Some(policy_id);
        store.keys().create(&bound).await.unwrap();
        store.keys().create(&test_key("t1", "Free", "h2")).await.unwrap();

        let found = store.keys().list_by_policy(policy_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Bound");
    }

    #[tokio::test]
    async fn test_key_delete_by_tenant() {
        let store = MemoryStore::new();
        store.keys().create(&test_key("t1", "A", "h1")).await.unwrap();
        store.keys().create(&test_key("t1", "B", "h2")).await.unwrap();
        store.keys().create(&test_key("t2", "C", "h3")).await.unwrap();

        store.keys().delete_by_tenant("t1").await.unwrap();

        assert_eq!(store.keys().count(&KeyFilter::default()).await.unwrap(), 1);
        assert!(store.keys().get_by_hash("h1").await.is_err());
        assert!(store.keys().get_by_hash("h3").await.is_ok());
    }

    #[tokio::test]
    async fn test_policy_crud() {
        let store = MemoryStore::new();
        let mut policy = Policy::new("standard");
        policy.tenant_id = "t1".into();

        store.policies().create(&policy).await.unwrap();

        let found = store.policies().get(policy.id).await.unwrap();
        assert_eq!(found.name, "standard");

        policy.description = Some("updated".into());
        store.policies().update(&policy).await.unwrap();
        let found = store.policies().get(policy.id).await.unwrap();
        assert_eq!(found.description.as_deref(), Some("updated"));

        store.policies().delete(policy.id).await.unwrap();
        assert!(matches!(
            store.policies().get(policy.id).await.unwrap_err(),
            Error::PolicyNotFound
        ));
    }

    #[tokio::test]
    async fn test_policy_name_unique_per_tenant() {
        let store = MemoryStore::new();
        let mut first = Policy::new("standard");
        first.tenant_id = "t1".into();
        store.policies().create(&first).await.unwrap();

        let mut duplicate = Policy::new("standard");
        duplicate.tenant_id = "t1".into();
        assert!(store.policies().create(&duplicate).await.unwrap_err().is_conflict());

        // The same name under another tenant is fine.
        let mut other_tenant = Policy::new("standard");
        other_tenant.tenant_id = "t2".into();
        store.policies().create(&other_tenant).await.unwrap();

        let found = store.policies().get_by_name("t2", "standard").await.unwrap();
        assert_eq!(found.id, other_tenant.id);
    }

    #[tokio::test]
    async fn test_policy_list_and_count() {
        let store = MemoryStore::new();
        for (tenant, name) in [("t1", "a"), ("t1", "b"), ("t2", "c")] {
            let mut policy = Policy::new(name);
            policy.tenant_id = tenant.into();
            store.policies().create(&policy).await.unwrap();
        }

        let tenant1 = store
            .policies()
            .list(&PolicyFilter::for_tenant("t1"))
            .await
            .unwrap();
        assert_eq!(tenant1.len(), 2);
        assert_eq!(
            store
                .policies()
                .count(&PolicyFilter::default())
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_scope_crud_and_unique_name() {
        let store = MemoryStore::new();
        let scope = test_scope("t1", "read:users");
        store.scopes().create(&scope).await.unwrap();

        let found = store.scopes().get_by_name("t1", "read:users").await.unwrap();
        assert_eq!(found.id, scope.id);

        assert!(store
            .scopes()
            .create(&test_scope("t1", "read:users"))
            .await
            .unwrap_err()
            .is_conflict());

        store.scopes().delete(scope.id).await.unwrap();
        assert!(store.scopes().get(scope.id).await.is_err());
    }

    #[tokio::test]
    async fn test_scope_list_sorted_by_name() {
        let store = MemoryStore::new();
        for name in ["write:users", "admin", "read:users"] {
            store.scopes().create(&test_scope("t1", name)).await.unwrap();
        }

        let listed = store
            .scopes()
            .list(&ScopeFilter::for_tenant("t1"))
            .await
            .unwrap();
        let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "read:users", "write:users"]);
    }

    #[tokio::test]
    async fn test_scope_assign_resolves_through_tenant() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "h1");
        store.keys().create(&key).await.unwrap();
        store.scopes().create(&test_scope("t1", "read:users")).await.unwrap();
        // Same name under another tenant must not satisfy the lookup.
        store.scopes().create(&test_scope("t2", "write:users")).await.unwrap();

        store
            .scopes()
            .assign_to_key(key.id, &["read:users".into()])
            .await
            .unwrap();

        let err = store
            .scopes()
            .assign_to_key(key.id, &["write:users".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound));

        let assigned = store.scopes().list_by_key(key.id).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].name, "read:users");
    }

    #[tokio::test]
    async fn test_scope_assign_idempotent_and_remove_silent() {
        let store = MemoryStore::new();
        let key = test_key("t1", "K", "h1");
        store.keys().create(&key).await.unwrap();
        store.scopes().create(&test_scope("t1", "read:users")).await.unwrap();

        let names = vec!["read:users".to_string()];
        store.scopes().assign_to_key(key.id, &names).await.unwrap();
        store.scopes().assign_to_key(key.id, &names).await.unwrap();
        assert_eq!(store.scopes().list_by_key(key.id).await.unwrap().len(), 1);

        // Removing an unassigned or unknown name is silent.
        store
            .scopes()
            .remove_from_key(key.id, &["read:users".into(), "never:assigned".into()])
            .await
            .unwrap();
        assert!(store.scopes().list_by_key(key.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usage_record_and_query() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();

        let record = UsageRecord::new(key_id, "/v1/users", "GET").with_tenant("t1");
        store.usages().record(&record).await.unwrap();

        let other = UsageRecord::new(Id::new_key(), "/v1/other", "POST").with_tenant("t1");
        store.usages().record(&other).await.unwrap();

        let found = store
            .usages()
            .query(&UsageFilter::for_key(key_id))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].endpoint, "/v1/users");

        assert_eq!(
            store.usages().count(&UsageFilter::default()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_usage_record_batch_and_purge() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();

        let mut old = UsageRecord::new(key_id, "/a", "GET");
        old.created_at = Utc::now() - chrono::Duration::days(30);
        let fresh = UsageRecord::new(key_id, "/b", "GET");
        store.usages().record_batch(&[old, fresh]).await.unwrap();

        let purged = store
            .usages()
            .purge(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(
            store.usages().count(&UsageFilter::default()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_usage_daily_and_monthly_counts() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();
        let now = Utc::now();

        let today = UsageRecord::new(key_id, "/a", "GET");
        let mut yesterday = UsageRecord::new(key_id, "/b", "GET");
        yesterday.created_at = now - chrono::Duration::days(1);
        let mut last_year = UsageRecord::new(key_id, "/c", "GET");
        last_year.created_at = now - chrono::Duration::days(400);
        store
            .usages()
            .record_batch(&[today, yesterday, last_year])
            .await
            .unwrap();

        assert_eq!(store.usages().daily_count(key_id, now).await.unwrap(), 1);
        let monthly = store.usages().monthly_count(key_id, now).await.unwrap();
        assert!(monthly >= 1 && monthly <= 2);
    }

    #[tokio::test]
    async fn test_usage_aggregate_reads_loaded_rows() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();

        store
            .load_aggregations(vec![UsageAggregation {
                key_id,
                tenant_id: "t1".into(),
                period: "day".into(),
                period_start: Utc::now(),
                request_count: 120,
                error_count: 3,
                total_latency_ms: 5400,
                p50_latency_ms: 40,
                p99_latency_ms: 210,
            }])
            .await;

        let rows = store
            .usages()
            .aggregate(&UsageFilter::for_key(key_id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 120);

        let none = store
            .usages()
            .aggregate(&UsageFilter::for_key(Id::new_key()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_create_get_and_latest() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();

        let mut first = test_rotation(key_id, Utc::now());
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        store.rotations().create(&first).await.unwrap();

        let second = test_rotation(key_id, Utc::now());
        store.rotations().create(&second).await.unwrap();

        let found = store.rotations().get(first.id).await.unwrap();
        assert_eq!(found.id, first.id);

        let latest = store.rotations().latest_for_key(key_id).await.unwrap();
        assert_eq!(latest.id, second.id);

        assert!(matches!(
            store.rotations().latest_for_key(Id::new_key()).await.unwrap_err(),
            Error::RotationNotFound
        ));
    }

    #[tokio::test]
    async fn test_rotation_list_filters() {
        let store = MemoryStore::new();
        let key_id = Id::new_key();
        store.rotations().create(&test_rotation(key_id, Utc::now())).await.unwrap();
        store
            .rotations()
            .create(&test_rotation(Id::new_key(), Utc::now()))
            .await
            .unwrap();

        let found = store
            .rotations()
            .list(&RotationFilter::for_key(key_id))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let all = store
            .rotations()
            .list(&RotationFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_rotation_pending_grace_sorted_ascending() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let late = test_rotation(Id::new_key(), now + chrono::Duration::hours(2));
        let soon = test_rotation(Id::new_key(), now + chrono::Duration::hours(1));
        let passed = test_rotation(Id::new_key(), now - chrono::Duration::hours(1));
        store.rotations().create(&late).await.unwrap();
        store.rotations().create(&soon).await.unwrap();
        store.rotations().create(&passed).await.unwrap();

        let pending = store.rotations().list_pending_grace(now).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, soon.id);
        assert_eq!(pending[1].id, late.id);
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let store = MemoryStore::new();
        store.migrate().await.unwrap();
        store.ping().await.unwrap();
        store.close().await.unwrap();
    }
}
