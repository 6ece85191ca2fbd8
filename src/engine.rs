//! The engine: the only component callers interact with.
//!
//! It reads the tenant scope from the ambient context, consults the
//! store, applies policy rules, transitions key state, and fans events
//! out through the hook manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context;
use crate::domain::error::{Error, Result};
use crate::domain::generator::{HexKeyGenerator, KeyGenerator};
use crate::domain::hasher::{KeyHasher, Sha256Hasher};
use crate::domain::id::{Id, KeyId, PolicyId, ScopeId};
use crate::domain::key::{Environment, Key, KeyFilter, KeyState};
use crate::domain::plugin::{HookManager, Plugin};
use crate::domain::policy::{Policy, PolicyFilter};
use crate::domain::rate_limit::RateLimiter;
use crate::domain::rotation::{RotationFilter, RotationReason, RotationRecord};
use crate::domain::scope::{Scope, ScopeFilter};
use crate::domain::store::Store;
use crate::domain::usage::{UsageAggregation, UsageFilter, UsageRecord};

/// Grace window applied to rotations when the key's policy does not set one.
const DEFAULT_GRACE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parameters for creating a new API key.
#[derive(Debug, Clone, Default)]
pub struct CreateKeyInput {
    pub name: String,
    pub description: Option<String>,
    /// Falls back to the engine's configured default when empty.
    pub prefix: String,
    /// Falls back to the engine's configured default when unset.
    pub environment: Option<Environment>,
    pub policy_id: Option<PolicyId>,
    pub scopes: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_by: Option<String>,
    /// Takes effect only when the ambient context carries no tenant.
    pub tenant_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateKeyInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_policy(mut self, policy_id: PolicyId) -> Self {
        self.policy_id = Some(policy_id);
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Returned from key creation and rotation. The raw key is surfaced
/// exactly once; callers that lose it must rotate.
#[derive(Debug, Clone)]
pub struct CreateKeyResult {
    pub key: Key,
    pub raw_key: String,
}

/// Returned from successful validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub key: Key,
    pub scopes: Vec<String>,
    pub policy: Option<Policy>,
}

/// Builds an [`Engine`]. Only the store is required.
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn Store>>,
    hasher: Option<Arc<dyn KeyHasher>>,
    generator: Option<Arc<dyn KeyGenerator>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    config: EngineConfig,
    hooks: HookManager,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a lifecycle plug-in. Registration order is dispatch order.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.hooks.register(plugin);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let store = self
            .store
            .ok_or_else(|| Error::validation("engine: store is required"))?;

        let generator = self.generator.unwrap_or_else(|| {
            Arc::new(HexKeyGenerator::new().with_byte_len(self.config.default_key_length))
        });

        Ok(Engine {
            store,
            hasher: self.hasher.unwrap_or_else(|| Arc::new(Sha256Hasher)),
            generator,
            rate_limiter: self.rate_limiter,
            config: self.config,
            hooks: self.hooks,
        })
    }
}

/// Coordinates the hasher, generator, store, rate limiter, and hook
/// manager; owns the key lifecycle state machine.
pub struct Engine {
    store: Arc<dyn Store>,
    hasher: Arc<dyn KeyHasher>,
    generator: Arc<dyn KeyGenerator>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    config: EngineConfig,
    hooks: HookManager,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("hasher", &self.hasher)
            .field("generator", &self.generator)
            .field("rate_limiter", &self.rate_limiter)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The underlying composite store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Start the engine. Background workers are the caller's concern;
    /// this is a hook point for symmetry with [`Engine::stop`].
    pub async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Gracefully shut down, firing the shutdown hook. Closing the
    /// store remains the caller's responsibility.
    pub async fn stop(&self) -> Result<()> {
        self.hooks.fire_shutdown().await
    }

    // ── Key lifecycle ─────────────────────────────

    /// Generate a new API key, hash it, store the hash, and return the
    /// raw key exactly once. The raw key is never persisted.
    pub async fn create_key(&self, input: CreateKeyInput) -> Result<CreateKeyResult> {
        let scope = context::current();
        let tenant_id = if scope.tenant_id.is_empty() {
            input.tenant_id.clone().unwrap_or_default()
        } else {
            scope.tenant_id
        };

        let prefix = if input.prefix.is_empty() {
            self.config.default_prefix.clone()
        } else {
            input.prefix
        };
        let environment = input.environment.unwrap_or(self.config.default_environment);

        let raw_key = self.generator.generate(&prefix, environment)?;
        let key_hash = self.hasher.hash(&raw_key)?;

        let now = Utc::now();
        let mut key = Key {
            id: Id::new_key(),
            tenant_id,
            app_id: scope.app_id,
            name: input.name,
            description: input.description,
            prefix,
            hint: hint_of(&raw_key),
            key_hash,
            environment,
            state: KeyState::Active,
            policy_id: input.policy_id,
            scopes: Vec::new(),
            metadata: input.metadata,
            created_by: input.created_by,
            expires_at: input.expires_at,
            last_used_at: None,
            rotated_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };

        // Apply policy constraints if assigned.
        if let Some(policy_id) = key.policy_id {
            let policy = self.store.policies().get(policy_id).await?;
            if key.expires_at.is_none() {
                if let Some(lifetime) = policy.max_key_lifetime.filter(|d| !d.is_zero()) {
                    key.expires_at = Some(now + to_chrono(lifetime)?);
                }
            }
        }

        if let Err(error) = self.store.keys().create(&key).await {
            self.log_hook_failure(
                "key_create_failed",
                self.hooks.fire_key_create_failed(&key, &error).await,
            );
            return Err(error);
        }

        if !input.scopes.is_empty() {
            // A missing scope name fails the call; the key row stays in
            // place so the caller may retry the assignment.
            self.store.scopes().assign_to_key(key.id, &input.scopes).await?;
            key.scopes = input.scopes;
        }

        self.log_hook_failure("key_created", self.hooks.fire_key_created(&key).await);
        info!(key_id = %key.id, name = %key.name, environment = %key.environment, "API key created");

        Ok(CreateKeyResult { key, raw_key })
    }

    /// Validate a raw API key. This is the hot path: one store round
    /// trip in the common case, and the last-used update happens off
    /// the caller's critical path.
    pub async fn validate_key(&self, raw_key: &str) -> Result<ValidationResult> {
        let key_hash = self.hasher.hash(raw_key)?;

        // Any lookup failure surfaces as InvalidKey so the caller cannot
        // distinguish a miss from a backend fault.
        let key = match self.store.keys().get_by_hash(&key_hash).await {
            Ok(key) => key,
            Err(error) => {
                self.log_hook_failure(
                    "key_validation_failed",
                    self.hooks.fire_key_validation_failed(raw_key, &error).await,
                );
                return Err(Error::InvalidKey);
            }
        };

        if !key.state.is_validatable() {
            self.log_hook_failure(
                "key_validation_failed",
                self.hooks
                    .fire_key_validation_failed(raw_key, &Error::KeyInactive)
                    .await,
            );
            return Err(Error::KeyInactive);
        }

        let now = Utc::now();
        if key.is_expired_at(now) {
            let _ = self.store.keys().update_state(key.id, KeyState::Expired).await;
            self.log_hook_failure("key_expired", self.hooks.fire_key_expired(&key).await);
            return Err(Error::KeyExpired);
        }

        // A key parked in the rotated state is only honoured inside its
        // grace window; past it, the key is revoked for good.
        if key.state == KeyState::Rotated {
            if let Ok(latest) = self.store.rotations().latest_for_key(key.id).await {
                if now > latest.grace_ends {
                    let _ = self.store.keys().update_state(key.id, KeyState::Revoked).await;
                    return Err(Error::KeyRevoked);
                }
            }
        }

        let policy = match key.policy_id {
            Some(policy_id) => self.store.policies().get(policy_id).await.ok(),
            None => None,
        };

        if let (Some(policy), Some(limiter)) = (policy.as_ref(), self.rate_limiter.as_ref()) {
            if policy.rate_limit > 0 {
                let allowed = limiter
                    .allow(&key.id.to_string(), policy.rate_limit, policy.rate_limit_window)
                    .await
                    .unwrap_or(false);
                if !allowed {
                    self.log_hook_failure(
                        "key_rate_limited",
                        self.hooks.fire_key_rate_limited(&key).await,
                    );
                    return Err(Error::RateLimited);
                }
            }
        }

        let scopes = self
            .store
            .scopes()
            .list_by_key(key.id)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.name)
            .collect();

        // Detached task: the update must survive the caller going away,
        // and its failure must not affect the validation result.
        let store = Arc::clone(&self.store);
        let key_id = key.id;
        tokio::spawn(async move {
            let _ = store.keys().update_last_used(key_id, Utc::now()).await;
        });

        self.log_hook_failure("key_validated", self.hooks.fire_key_validated(&key).await);
        debug!(key_id = %key.id, "API key validated");

        Ok(ValidationResult { key, scopes, policy })
    }

    /// Issue a fresh credential for the same key row. The old hash
    /// stops existing the moment the update commits; the grace window
    /// is recorded for auditing and the revocation sweep.
    pub async fn rotate_key(
        &self,
        key_id: KeyId,
        reason: RotationReason,
    ) -> Result<CreateKeyResult> {
        let mut key = self.store.keys().get(key_id).await?;
        if key.state.is_terminal() {
            return Err(Error::InvalidStateTransition);
        }

        let mut grace_ttl = DEFAULT_GRACE_TTL;
        if let Some(policy_id) = key.policy_id {
            if let Ok(policy) = self.store.policies().get(policy_id).await {
                if let Some(grace) = policy.grace_period.filter(|d| !d.is_zero()) {
                    grace_ttl = grace;
                }
            }
        }

        let raw_key = self.generator.generate(&key.prefix, key.environment)?;
        let new_hash = self.hasher.hash(&raw_key)?;
        let old_hash = key.key_hash.clone();
        let now = Utc::now();

        key.key_hash = new_hash.clone();
        key.hint = hint_of(&raw_key);
        key.rotated_at = Some(now);
        key.updated_at = now;
        self.store.keys().update(&key).await?;

        let record = RotationRecord {
            id: Id::new_rotation(),
            key_id: key.id,
            tenant_id: key.tenant_id.clone(),
            old_key_hash: old_hash,
            new_key_hash: new_hash,
            reason,
            grace_ttl,
            grace_ends: now + to_chrono(grace_ttl)?,
            rotated_by: None,
            created_at: now,
        };
        self.store.rotations().create(&record).await?;

        self.log_hook_failure("key_rotated", self.hooks.fire_key_rotated(&key, &record).await);
        info!(key_id = %key.id, reason = %reason, "API key rotated");

        Ok(CreateKeyResult { key, raw_key })
    }

    /// Permanently disable a key. Legal from any non-terminal state.
    pub async fn revoke_key(&self, key_id: KeyId, reason: &str) -> Result<()> {
        let mut key = self.store.keys().get(key_id).await?;
        if key.state.is_terminal() {
            return Err(Error::InvalidStateTransition);
        }

        let now = Utc::now();
        key.state = KeyState::Revoked;
        key.revoked_at = Some(now);
        key.updated_at = now;
        self.store.keys().update(&key).await?;

        self.log_hook_failure("key_revoked", self.hooks.fire_key_revoked(&key, reason).await);
        info!(key_id = %key.id, reason, "API key revoked");
        Ok(())
    }

    /// Temporarily disable an active key.
    pub async fn suspend_key(&self, key_id: KeyId) -> Result<()> {
        let key = self.store.keys().get(key_id).await?;
        if key.state != KeyState::Active {
            return Err(Error::InvalidStateTransition);
        }

        self.store.keys().update_state(key_id, KeyState::Suspended).await?;
        self.log_hook_failure("key_suspended", self.hooks.fire_key_suspended(&key).await);
        info!(key_id = %key.id, "API key suspended");
        Ok(())
    }

    /// Re-enable a suspended key. Any other source state fails.
    pub async fn reactivate_key(&self, key_id: KeyId) -> Result<()> {
        let key = self.store.keys().get(key_id).await?;
        if key.state != KeyState::Suspended {
            return Err(Error::InvalidStateTransition);
        }

        self.store.keys().update_state(key_id, KeyState::Active).await?;
        self.log_hook_failure("key_reactivated", self.hooks.fire_key_reactivated(&key).await);
        info!(key_id = %key.id, "API key reactivated");
        Ok(())
    }

    pub async fn get_key(&self, key_id: KeyId) -> Result<Key> {
        self.store.keys().get(key_id).await
    }

    pub async fn list_keys(&self, filter: &KeyFilter) -> Result<Vec<Key>> {
        self.store.keys().list(filter).await
    }

    // ── Policy management ─────────────────────────

    /// Create a policy, stamping a fresh id and the ambient tenant scope.
    pub async fn create_policy(&self, mut policy: Policy) -> Result<Policy> {
        let scope = context::current();
        let now = Utc::now();
        policy.id = Id::new_policy();
        policy.tenant_id = scope.tenant_id;
        policy.app_id = scope.app_id;
        policy.created_at = now;
        policy.updated_at = now;

        self.store.policies().create(&policy).await?;
        self.log_hook_failure("policy_created", self.hooks.fire_policy_created(&policy).await);
        info!(policy_id = %policy.id, name = %policy.name, "policy created");
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: PolicyId) -> Result<Policy> {
        self.store.policies().get(policy_id).await
    }

    pub async fn update_policy(&self, mut policy: Policy) -> Result<Policy> {
        policy.updated_at = Utc::now();
        self.store.policies().update(&policy).await?;
        self.log_hook_failure("policy_updated", self.hooks.fire_policy_updated(&policy).await);
        Ok(policy)
    }

    /// Delete a policy. Fails while any non-terminal key references it.
    pub async fn delete_policy(&self, policy_id: PolicyId) -> Result<()> {
        let keys = self.store.keys().list_by_policy(policy_id).await?;
        if keys.iter().any(|k| !k.state.is_terminal()) {
            return Err(Error::PolicyInUse);
        }

        self.store.policies().delete(policy_id).await?;
        self.log_hook_failure("policy_deleted", self.hooks.fire_policy_deleted(policy_id).await);
        info!(policy_id = %policy_id, "policy deleted");
        Ok(())
    }

    pub async fn list_policies(&self, filter: &PolicyFilter) -> Result<Vec<Policy>> {
        self.store.policies().list(filter).await
    }

    // ── Scope management ──────────────────────────

    /// Create a permission scope under the ambient tenant.
    pub async fn create_scope(&self, mut scope: Scope) -> Result<Scope> {
        let ambient = context::current();
        scope.id = Id::new_scope();
        scope.tenant_id = ambient.tenant_id;
        scope.app_id = ambient.app_id;
        scope.created_at = Utc::now();

        self.store.scopes().create(&scope).await?;
        Ok(scope)
    }

    pub async fn list_scopes(&self, filter: &ScopeFilter) -> Result<Vec<Scope>> {
        self.store.scopes().list(filter).await
    }

    pub async fn delete_scope(&self, scope_id: ScopeId) -> Result<()> {
        self.store.scopes().delete(scope_id).await
    }

    pub async fn assign_scopes(&self, key_id: KeyId, scope_names: &[String]) -> Result<()> {
        self.store.scopes().assign_to_key(key_id, scope_names).await
    }

    pub async fn remove_scopes(&self, key_id: KeyId, scope_names: &[String]) -> Result<()> {
        self.store.scopes().remove_from_key(key_id, scope_names).await
    }

    // ── Usage & analytics ─────────────────────────

    /// Record a usage event, stamping a fresh id and timestamp. When to
    /// record is the embedding application's decision.
    pub async fn record_usage(&self, mut record: UsageRecord) -> Result<UsageRecord> {
        record.id = Id::new_usage();
        record.created_at = Utc::now();
        self.store.usages().record(&record).await?;
        Ok(record)
    }

    pub async fn query_usage(&self, filter: &UsageFilter) -> Result<Vec<UsageRecord>> {
        self.store.usages().query(filter).await
    }

    pub async fn aggregate_usage(&self, filter: &UsageFilter) -> Result<Vec<UsageAggregation>> {
        self.store.usages().aggregate(filter).await
    }

    pub async fn list_rotations(&self, filter: &RotationFilter) -> Result<Vec<RotationRecord>> {
        self.store.rotations().list(filter).await
    }

    // ── Cleanup sweeps ────────────────────────────

    /// Transition every active key past its `expires_at` to expired.
    /// Idempotent; per-key failures are logged and skipped.
    pub async fn cleanup_expired_keys(&self) -> Result<()> {
        let keys = self.store.keys().list_expired(Utc::now()).await?;
        for key in keys {
            if let Err(error) = self.store.keys().update_state(key.id, KeyState::Expired).await {
                warn!(key_id = %key.id, %error, "failed to expire key");
                continue;
            }
            self.log_hook_failure("key_expired", self.hooks.fire_key_expired(&key).await);
        }
        Ok(())
    }

    /// Revoke keys still parked in the rotated state once their grace
    /// window has passed. Idempotent.
    pub async fn cleanup_grace_expired(&self) -> Result<()> {
        let now = Utc::now();
        // Records arrive ordered by grace_ends ascending, so the scan
        // stops at the first window that is still open.
        let records = self
            .store
            .rotations()
            .list_pending_grace(DateTime::<Utc>::MIN_UTC)
            .await?;

        for record in records {
            if record.grace_ends > now {
                break;
            }
            let key = match self.store.keys().get(record.key_id).await {
                Ok(key) => key,
                Err(error) => {
                    warn!(key_id = %record.key_id, %error, "failed to load key for grace sweep");
                    continue;
                }
            };
            if key.state != KeyState::Rotated {
                continue;
            }
            if let Err(error) = self.store.keys().update_state(key.id, KeyState::Revoked).await {
                warn!(key_id = %key.id, %error, "failed to revoke grace-expired key");
            }
        }
        Ok(())
    }

    fn log_hook_failure(&self, hook: &'static str, result: Result<()>) {
        if let Err(error) = result {
            warn!(hook, %error, "lifecycle hook failed");
        }
    }
}

fn hint_of(raw_key: &str) -> String {
    // Raw keys are ASCII by the generator contract.
    raw_key[raw_key.len().saturating_sub(4)..].to_string()
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|_| Error::validation("duration out of range"))
}
