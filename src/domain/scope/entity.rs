//! Permission scopes assignable to API keys.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::ScopeId;

/// A named permission scope, tenant-scoped and unique by name within a
/// tenant. The optional parent records an ancestor name; the hierarchy
/// is advisory and nothing resolves it transitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub tenant_id: String,
    pub app_id: String,
    /// e.g. `read:users`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScopeId::new_scope(),
            tenant_id: String::new(),
            app_id: String::new(),
            name: name.into(),
            description: None,
            parent: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Filters for listing scopes. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    pub tenant_id: Option<String>,
    pub parent: Option<String>,
    /// `<= 0` means "use the backend default".
    pub limit: i64,
    pub offset: i64,
}

impl ScopeFilter {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }
}
