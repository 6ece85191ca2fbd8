//! Lifecycle hook kinds and the plug-in contract.

use async_trait::async_trait;

use crate::domain::error::{Error, Result};
use crate::domain::id::PolicyId;
use crate::domain::key::Key;
use crate::domain::policy::Policy;
use crate::domain::rotation::RotationRecord;

/// The lifecycle events a plug-in can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    KeyCreated,
    KeyCreateFailed,
    KeyValidated,
    KeyValidationFailed,
    KeyRotated,
    KeyRevoked,
    KeySuspended,
    KeyReactivated,
    KeyExpired,
    KeyRateLimited,
    PolicyCreated,
    PolicyUpdated,
    PolicyDeleted,
    Shutdown,
}

/// All hook kinds, in a stable order. Handy for plug-ins that observe
/// everything, like the audit plug-in.
pub const ALL_HOOKS: &[HookKind] = &[
    HookKind::KeyCreated,
    HookKind::KeyCreateFailed,
    HookKind::KeyValidated,
    HookKind::KeyValidationFailed,
    HookKind::KeyRotated,
    HookKind::KeyRevoked,
    HookKind::KeySuspended,
    HookKind::KeyReactivated,
    HookKind::KeyExpired,
    HookKind::KeyRateLimited,
    HookKind::PolicyCreated,
    HookKind::PolicyUpdated,
    HookKind::PolicyDeleted,
    HookKind::Shutdown,
];

/// An external observer/extender of engine lifecycle events.
///
/// A plug-in advertises the kinds it handles through [`Plugin::hooks`]
/// and overrides the matching `on_*` methods; the rest keep their no-op
/// defaults. The manager never calls a handler whose kind is not in the
/// capability set. Handlers receive read-only references; mutating the
/// entities they point at is undefined behaviour.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// The hook kinds this plug-in subscribes to.
    fn hooks(&self) -> &[HookKind];

    async fn on_key_created(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_key_create_failed(&self, _key: &Key, _cause: &Error) -> Result<()> {
        Ok(())
    }

    async fn on_key_validated(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_key_validation_failed(&self, _raw_key: &str, _cause: &Error) -> Result<()> {
        Ok(())
    }

    async fn on_key_rotated(&self, _key: &Key, _record: &RotationRecord) -> Result<()> {
        Ok(())
    }

    async fn on_key_revoked(&self, _key: &Key, _reason: &str) -> Result<()> {
        Ok(())
    }

    async fn on_key_suspended(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_key_reactivated(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_key_expired(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_key_rate_limited(&self, _key: &Key) -> Result<()> {
        Ok(())
    }

    async fn on_policy_created(&self, _policy: &Policy) -> Result<()> {
        Ok(())
    }

    async fn on_policy_updated(&self, _policy: &Policy) -> Result<()> {
        Ok(())
    }

    async fn on_policy_deleted(&self, _policy_id: PolicyId) -> Result<()> {
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<()> {
        Ok(())
    }
}
