//! Reference audit plug-in.
//!
//! Bridges every lifecycle event to an [`AuditSink`] as a structured
//! [`AuditEvent`]. The default sink emits through `tracing`; the
//! collector sink captures events for assertions in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::error::{Error, Result};
use crate::domain::id::PolicyId;
use crate::domain::key::Key;
use crate::domain::plugin::{HookKind, Plugin};
use crate::domain::policy::Policy;
use crate::domain::rotation::RotationRecord;

pub mod action {
    pub const KEY_CREATED: &str = "key.created";
    pub const KEY_CREATE_FAILED: &str = "key.create_failed";
    pub const KEY_VALIDATED: &str = "key.validated";
    pub const KEY_VALIDATION_FAILED: &str = "key.validation_failed";
    pub const KEY_ROTATED: &str = "key.rotated";
    pub const KEY_REVOKED: &str = "key.revoked";
    pub const KEY_SUSPENDED: &str = "key.suspended";
    pub const KEY_REACTIVATED: &str = "key.reactivated";
    pub const KEY_EXPIRED: &str = "key.expired";
    pub const KEY_RATE_LIMITED: &str = "key.rate_limited";
    pub const POLICY_CREATED: &str = "policy.created";
    pub const POLICY_UPDATED: &str = "policy.updated";
    pub const POLICY_DELETED: &str = "policy.deleted";
}

pub mod severity {
    pub const INFO: &str = "info";
    pub const WARNING: &str = "warning";
}

pub mod outcome {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
}

pub mod category {
    pub const KEY_LIFECYCLE: &str = "key_lifecycle";
    pub const KEY_VALIDATION: &str = "key_validation";
    pub const KEY_SECURITY: &str = "key_security";
    pub const POLICY_LIFECYCLE: &str = "policy_lifecycle";
}

/// A single audit trail entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: &'static str,
    pub resource: &'static str,
    pub category: &'static str,
    pub resource_id: String,
    pub outcome: &'static str,
    pub severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Where audit events go. A failing sink halts hook dispatch, which the
/// engine logs and swallows.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Emits audit events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, event: AuditEvent) -> Result<()> {
        match event.severity {
            severity::WARNING => warn!(
                action = event.action,
                resource_id = %event.resource_id,
                outcome = event.outcome,
                reason = event.reason.as_deref().unwrap_or(""),
                "audit event"
            ),
            _ => info!(
                action = event.action,
                resource_id = %event.resource_id,
                outcome = event.outcome,
                "audit event"
            ),
        }
        Ok(())
    }
}

/// Captures audit events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectorSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("collector poisoned").clone()
    }
}

impl AuditSink for CollectorSink {
    fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().expect("collector poisoned").push(event);
        Ok(())
    }
}

const AUDITED_HOOKS: &[HookKind] = &[
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
];

/// Translates lifecycle events into audit trail entries.
pub struct AuditPlugin {
    sink: Arc<dyn AuditSink>,
}

impl AuditPlugin {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// An audit plug-in that logs through `tracing`.
    pub fn with_tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    fn key_event(
        &self,
        action: &'static str,
        category: &'static str,
        severity: &'static str,
        outcome: &'static str,
        key: &Key,
    ) -> AuditEvent {
        let mut metadata = HashMap::new();
        metadata.insert("key_name".to_string(), key.name.clone());
        metadata.insert("environment".to_string(), key.environment.to_string());
        metadata.insert("tenant_id".to_string(), key.tenant_id.clone());

        AuditEvent {
            action,
            resource: "key",
            category,
            resource_id: key.id.to_string(),
            outcome,
            severity,
            reason: None,
            metadata,
        }
    }
}

#[async_trait]
impl Plugin for AuditPlugin {
    fn name(&self) -> &str {
        "audit"
    }

    fn hooks(&self) -> &[HookKind] {
        AUDITED_HOOKS
    }

    async fn on_key_created(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_CREATED,
            category::KEY_LIFECYCLE,
            severity::INFO,
            outcome::SUCCESS,
            key,
        ))
    }

    async fn on_key_create_failed(&self, key: &Key, cause: &Error) -> Result<()> {
        let mut event = self.key_event(
            action::KEY_CREATE_FAILED,
            category::KEY_LIFECYCLE,
            severity::WARNING,
            outcome::FAILURE,
            key,
        );
        event.reason = Some(cause.to_string());
        self.sink.record(event)
    }

    async fn on_key_validated(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_VALIDATED,
            category::KEY_VALIDATION,
            severity::INFO,
            outcome::SUCCESS,
            key,
        ))
    }

    async fn on_key_validation_failed(&self, _raw_key: &str, cause: &Error) -> Result<()> {
        // The raw key never reaches the audit trail.
        self.sink.record(AuditEvent {
            action: action::KEY_VALIDATION_FAILED,
            resource: "key",
            category: category::KEY_VALIDATION,
            resource_id: String::new(),
            outcome: outcome::FAILURE,
            severity: severity::WARNING,
            reason: Some(cause.to_string()),
            metadata: HashMap::new(),
        })
    }

    async fn on_key_rotated(&self, key: &Key, record: &RotationRecord) -> Result<()> {
        let mut event = self.key_event(
            action::KEY_ROTATED,
            category::KEY_SECURITY,
            severity::INFO,
            outcome::SUCCESS,
            key,
        );
        event
            .metadata
            .insert("reason".to_string(), record.reason.to_string());
        event
            .metadata
            .insert("grace_ends".to_string(), record.grace_ends.to_rfc3339());
        self.sink.record(event)
    }

    async fn on_key_revoked(&self, key: &Key, reason: &str) -> Result<()> {
        let mut event = self.key_event(
            action::KEY_REVOKED,
            category::KEY_SECURITY,
            severity::WARNING,
            outcome::SUCCESS,
            key,
        );
        event.reason = Some(reason.to_string());
        self.sink.record(event)
    }

    async fn on_key_suspended(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_SUSPENDED,
            category::KEY_LIFECYCLE,
            severity::WARNING,
            outcome::SUCCESS,
            key,
        ))
    }

    async fn on_key_reactivated(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_REACTIVATED,
            category::KEY_LIFECYCLE,
            severity::INFO,
            outcome::SUCCESS,
            key,
        ))
    }

    async fn on_key_expired(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_EXPIRED,
            category::KEY_LIFECYCLE,
            severity::INFO,
            outcome::SUCCESS,
            key,
        ))
    }

    async fn on_key_rate_limited(&self, key: &Key) -> Result<()> {
        self.sink.record(self.key_event(
            action::KEY_RATE_LIMITED,
            category::KEY_SECURITY,
            severity::WARNING,
            outcome::FAILURE,
            key,
        ))
    }

    async fn on_policy_created(&self, policy: &Policy) -> Result<()> {
        self.sink.record(AuditEvent {
            action: action::POLICY_CREATED,
            resource: "policy",
            category: category::POLICY_LIFECYCLE,
            resource_id: policy.id.to_string(),
            outcome: outcome::SUCCESS,
            severity: severity::INFO,
            reason: None,
            metadata: HashMap::from([("policy_name".to_string(), policy.name.clone())]),
        })
    }

    async fn on_policy_updated(&self, policy: &Policy) -> Result<()> {
        self.sink.record(AuditEvent {
            action: action::POLICY_UPDATED,
            resource: "policy",
            category: category::POLICY_LIFECYCLE,
            resource_id: policy.id.to_string(),
            outcome: outcome::SUCCESS,
            severity: severity::INFO,
            reason: None,
            metadata: HashMap::from([("policy_name".to_string(), policy.name.clone())]),
        })
    }

    async fn on_policy_deleted(&self, policy_id: PolicyId) -> Result<()> {
        self.sink.record(AuditEvent {
            action: action::POLICY_DELETED,
            resource: "policy",
            category: category::POLICY_LIFECYCLE,
            resource_id: policy_id.to_string(),
            outcome: outcome::SUCCESS,
            severity: severity::INFO,
            reason: None,
            metadata: HashMap::new(),
        })
    }
}
