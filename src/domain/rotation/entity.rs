//! Key rotation audit records.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{KeyId, RotationId};

/// Why a rotation occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationReason {
    /// Policy-driven automatic rotation.
    Scheduled,
    /// User-initiated rotation.
    Manual,
    /// Rotation after a suspected credential compromise.
    Compromise,
    /// Rotation forced by a policy change.
    Policy,
}

impl fmt::Display for RotationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::Compromise => "compromise",
            Self::Policy => "policy",
        };
        f.write_str(s)
    }
}

/// Immutable audit row written once per successful rotation.
///
/// Immediately after commit, `new_key_hash` equals the key row's current
/// `key_hash`; `old_key_hash` is the fingerprint the rotation retired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationRecord {
    pub id: RotationId,
    pub key_id: KeyId,
    pub tenant_id: String,
    #[serde(skip_serializing, default)]
    pub old_key_hash: String,
    #[serde(skip_serializing, default)]
    pub new_key_hash: String,
    pub reason: RotationReason,
    pub grace_ttl: Duration,
    pub grace_ends: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing rotation records. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct RotationFilter {
    pub key_id: Option<KeyId>,
    pub tenant_id: Option<String>,
    pub reason: Option<RotationReason>,
    /// `<= 0` means "use the backend default".
    pub limit: i64,
    pub offset: i64,
}

impl RotationFilter {
    pub fn for_key(key_id: KeyId) -> Self {
        Self {
            key_id: Some(key_id),
            ..Self::default()
        }
    }
}
