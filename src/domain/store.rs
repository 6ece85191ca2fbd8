//! The composite persistence facade.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::key::KeyRepository;
use crate::domain::policy::PolicyRepository;
use crate::domain::rotation::RotationRepository;
use crate::domain::scope::ScopeRepository;
use crate::domain::usage::UsageRepository;

/// Composes the five subsystem repositories behind one facade so a
/// single backend can present them transactionally when desired. The
/// store owns all I/O resources; closing it is the caller's
/// responsibility, not the engine's.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    fn keys(&self) -> &dyn KeyRepository;

    fn policies(&self) -> &dyn PolicyRepository;

    fn scopes(&self) -> &dyn ScopeRepository;

    fn usages(&self) -> &dyn UsageRepository;

    fn rotations(&self) -> &dyn RotationRepository;

    /// Run schema migrations.
    async fn migrate(&self) -> crate::domain::error::Result<()>;

    /// Check backend connectivity.
    async fn ping(&self) -> crate::domain::error::Result<()>;

    /// Release backend resources.
    async fn close(&self) -> crate::domain::error::Result<()>;
}
