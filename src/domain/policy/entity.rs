//! Key policies: rate limits, allowlists, and lifetime constraints.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::PolicyId;

/// Rules attached to one or more API keys.
///
/// Policies are tenant-scoped and reusable across keys. The engine
/// applies the rate limit and lifetime ceiling itself; the allowlists
/// are enforced by the embedding layer through the `allows_*` helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub tenant_id: String,
    pub app_id: String,
    /// Unique per tenant.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Requests per window; `0` disables rate limiting.
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    pub burst_limit: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_scopes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_ips: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_origins: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allowed_paths: Vec<String>,
    /// Ceiling on key lifetime; applied as a default `expires_at` at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_key_lifetime: Option<Duration>,
    /// Suggested rotation cadence. Advisory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<Duration>,
    /// Grace window applied to rotations of keys under this policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<Duration>,
    /// `0` means unlimited.
    pub daily_quota: u64,
    pub monthly_quota: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Create a policy with the given name and everything else unset.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PolicyId::new_policy(),
            tenant_id: String::new(),
            app_id: String::new(),
            name: name.into(),
            description: None,
            rate_limit: 0,
            rate_limit_window: Duration::from_secs(60),
            burst_limit: 0,
            allowed_scopes: Vec::new(),
            allowed_ips: Vec::new(),
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_paths: Vec::new(),
            max_key_lifetime: None,
            rotation_period: None,
            grace_period: None,
            daily_quota: 0,
            monthly_quota: 0,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_limit_window = window;
        self
    }

    pub fn with_max_key_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_key_lifetime = Some(lifetime);
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = Some(grace);
        self
    }

    pub fn with_allowed_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_ips(mut self, ips: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_ips = ips.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_quotas(mut self, daily: u64, monthly: u64) -> Self {
        self.daily_quota = daily;
        self.monthly_quota = monthly;
        self
    }

    // Allowlist predicates. An empty list means "no restriction"; the
    // embedding layer decides when to consult these (the engine's
    // validation path does not).

    pub fn allows_scope(&self, scope: &str) -> bool {
        self.allowed_scopes.is_empty() || self.allowed_scopes.iter().any(|s| s == scope)
    }

    pub fn allows_ip(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|a| a == ip)
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.allowed_methods.is_empty()
            || self.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Path allowlists match by prefix so `/v1` covers `/v1/users`.
    pub fn allows_path(&self, path: &str) -> bool {
        self.allowed_paths.is_empty() || self.allowed_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Filters for listing policies. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub tenant_id: Option<String>,
    /// `<= 0` means "use the backend default".
    pub limit: i64,
    pub offset: i64,
}

impl PolicyFilter {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }
}
