//! Usage records and the aggregation read model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{KeyId, UsageId};

/// A single usage event for a key. Append-only; the embedding
/// application decides when to record one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: UsageId,
    pub key_id: KeyId,
    pub tenant_id: String,
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(key_id: KeyId, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: UsageId::new_usage(),
            key_id,
            tenant_id: String::new(),
            endpoint: endpoint.into(),
            method: method.into(),
            status_code: 200,
            ip_address: String::new(),
            user_agent: None,
            latency_ms: 0,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// 4xx and 5xx statuses count as errors in the aggregation model.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// Pre-computed aggregation row keyed by `(key, period, period_start)`.
///
/// Nothing in the engine populates this table; an external batch job or
/// incremental aggregator owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAggregation {
    pub key_id: KeyId,
    pub tenant_id: String,
    /// e.g. `hour`, `day`, `month`.
    pub period: String,
    pub period_start: DateTime<Utc>,
    pub request_count: u64,
    pub error_count: u64,
    pub total_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p99_latency_ms: u64,
}

/// Filters for querying usage. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct UsageFilter {
    pub key_id: Option<KeyId>,
    pub tenant_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub period: Option<String>,
    /// `<= 0` means "use the backend default".
    pub limit: i64,
    pub offset: i64,
}

impl UsageFilter {
    pub fn for_key(key_id: KeyId) -> Self {
        Self {
            key_id: Some(key_id),
            ..Self::default()
        }
    }
}
