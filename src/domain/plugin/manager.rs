//! Hook dispatch across registered plug-ins.

use std::fmt;
use std::sync::Arc;

use super::hooks::{HookKind, Plugin};
use crate::domain::error::{Error, Result};
use crate::domain::id::PolicyId;
use crate::domain::key::Key;
use crate::domain::policy::Policy;
use crate::domain::rotation::RotationRecord;

/// Holds registered plug-ins and dispatches lifecycle events to them in
/// registration order.
///
/// Dispatch halts on the first handler error and returns it, so tests
/// can assert ordering. The engine treats that error as non-fatal for
/// business operations; it logs and moves on.
#[derive(Default)]
pub struct HookManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for HookManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("HookManager").field("plugins", &names).finish()
    }
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plug-in. Order of registration is order of dispatch.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn subscribers(&self, kind: HookKind) -> impl Iterator<Item = &Arc<dyn Plugin>> + '_ {
        self.plugins.iter().filter(move |p| p.hooks().contains(&kind))
    }

    pub async fn fire_key_created(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyCreated) {
            plugin.on_key_created(key).await?;
        }
        Ok(())
    }

    pub async fn fire_key_create_failed(&self, key: &Key, cause: &Error) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyCreateFailed) {
            plugin.on_key_create_failed(key, cause).await?;
        }
        Ok(())
    }

    pub async fn fire_key_validated(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyValidated) {
            plugin.on_key_validated(key).await?;
        }
        Ok(())
    }

    pub async fn fire_key_validation_failed(&self, raw_key: &str, cause: &Error) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyValidationFailed) {
            plugin.on_key_validation_failed(raw_key, cause).await?;
        }
        Ok(())
    }

    pub async fn fire_key_rotated(&self, key: &Key, record: &RotationRecord) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyRotated) {
            plugin.on_key_rotated(key, record).await?;
        }
        Ok(())
    }

    pub async fn fire_key_revoked(&self, key: &Key, reason: &str) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyRevoked) {
            plugin.on_key_revoked(key, reason).await?;
        }
        Ok(())
    }

    pub async fn fire_key_suspended(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeySuspended) {
            plugin.on_key_suspended(key).await?;
        }
        Ok(())
    }

    pub async fn fire_key_reactivated(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyReactivated) {
            plugin.on_key_reactivated(key).await?;
        }
        Ok(())
    }

    pub async fn fire_key_expired(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyExpired) {
            plugin.on_key_expired(key).await?;
        }
        Ok(())
    }

    pub async fn fire_key_rate_limited(&self, key: &Key) -> Result<()> {
        for plugin in self.subscribers(HookKind::KeyRateLimited) {
            plugin.on_key_rate_limited(key).await?;
        }
        Ok(())
    }

    pub async fn fire_policy_created(&self, policy: &Policy) -> Result<()> {
        for plugin in self.subscribers(HookKind::PolicyCreated) {
            plugin.on_policy_created(policy).await?;
        }
        Ok(())
    }

    pub async fn fire_policy_updated(&self, policy: &Policy) -> Result<()> {
        for plugin in self.subscribers(HookKind::PolicyUpdated) {
            plugin.on_policy_updated(policy).await?;
        }
        Ok(())
    }

    pub async fn fire_policy_deleted(&self, policy_id: PolicyId) -> Result<()> {
        for plugin in self.subscribers(HookKind::PolicyDeleted) {
            plugin.on_policy_deleted(policy_id).await?;
        }
        Ok(())
    }

    pub async fn fire_shutdown(&self) -> Result<()> {
        for plugin in self.subscribers(HookKind::Shutdown) {
            plugin.on_shutdown().await?;
        }
        Ok(())
    }
}
