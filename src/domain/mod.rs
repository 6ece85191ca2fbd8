//! Domain layer: entities, persistence contracts, and component seams.

pub mod error;
pub mod generator;
pub mod hasher;
pub mod id;
pub mod key;
pub mod plugin;
pub mod policy;
pub mod rate_limit;
pub mod rotation;
pub mod scope;
pub mod store;
pub mod usage;

pub use error::{Error, Result};
pub use generator::{HexKeyGenerator, KeyGenerator};
pub use hasher::{KeyHasher, Sha256Hasher};
pub use id::{Id, KeyId, PolicyId, Prefix, RotationId, ScopeId, UsageId};
pub use key::{Environment, Key, KeyFilter, KeyRepository, KeyState};
pub use plugin::{HookKind, HookManager, Plugin, ALL_HOOKS};
pub use policy::{Policy, PolicyFilter, PolicyRepository};
pub use rate_limit::RateLimiter;
pub use rotation::{RotationFilter, RotationReason, RotationRecord, RotationRepository};
pub use scope::{Scope, ScopeFilter, ScopeRepository};
pub use store::Store;
pub use usage::{UsageAggregation, UsageFilter, UsageRecord, UsageRepository};
