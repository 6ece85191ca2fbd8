//! Tenant-scope propagation.
//!
//! Callers attach an `(app_id, tenant_id)` pair to the ambient task
//! before invoking the engine; every engine operation is implicitly
//! filtered by it. The scope rides a tokio task-local, so it follows
//! the call through `.await` points without threading a parameter
//! through every signature.

use std::future::Future;

use serde::{Deserialize, Serialize};

tokio::task_local! {
    static TENANT_SCOPE: TenantScope;
}

/// The `(app_id, tenant_id)` pair every operation is scoped to.
///
/// The empty scope is legal: a key created without a tenant is only
/// visible to queries that also pass the empty tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    pub app_id: String,
    pub tenant_id: String,
}

impl TenantScope {
    pub fn new(app_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.app_id.is_empty() && self.tenant_id.is_empty()
    }
}

/// Run a future with the given tenant scope attached.
pub async fn with_tenant<F>(
    app_id: impl Into<String>,
    tenant_id: impl Into<String>,
    fut: F,
) -> F::Output
where
    F: Future,
{
    TENANT_SCOPE.scope(TenantScope::new(app_id, tenant_id), fut).await
}

/// Run a future with an explicit [`TenantScope`] attached.
pub async fn with_scope<F>(scope: TenantScope, fut: F) -> F::Output
where
    F: Future,
{
    TENANT_SCOPE.scope(scope, fut).await
}

/// The scope attached to the current task, or the empty scope when none
/// was attached.
pub fn current() -> TenantScope {
    TENANT_SCOPE.try_with(Clone::clone).unwrap_or_default()
}
