//! API key entity and lifecycle states.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{KeyId, PolicyId};

/// Lifecycle state of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// The key is valid and usable.
    Active,
    /// The pre-rotation credential during its grace window.
    Rotated,
    /// The key is temporarily disabled.
    Suspended,
    /// The key passed its expiration time. Terminal.
    Expired,
    /// The key was permanently disabled. Terminal.
    Revoked,
}

impl KeyState {
    /// Terminal states are absorbing: no transition out of them is legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }

    /// Whether a key in this state may pass validation.
    pub fn is_validatable(self) -> bool {
        matches!(self, Self::Active | Self::Rotated)
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Rotated => "rotated",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

/// Deployment environment a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Live,
    Test,
    Staging,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Staging => "staging",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The core API key entity.
///
/// The raw key value is never persisted; only its hash is stored, and
/// the raw key is returned exactly once at creation or rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub tenant_id: String,
    pub app_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller-chosen short token embedded in the raw key (e.g. `sk`).
    pub prefix: String,
    /// Last four characters of the raw key, kept for display.
    pub hint: String,
    /// The only cryptographic residue of the raw key.
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub environment: Environment,
    pub state: KeyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    /// Scope names materialised from the key↔scope junction.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Key {
    /// Whether the key has passed its expiration time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Filters for listing keys. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    pub tenant_id: Option<String>,
    pub environment: Option<Environment>,
    pub state: Option<KeyState>,
    pub policy_id: Option<PolicyId>,
    pub created_by: Option<String>,
    /// `<= 0` means "use the backend default".
    pub limit: i64,
    pub offset: i64,
}

impl KeyFilter {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: KeyState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}
