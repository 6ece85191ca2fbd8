//! Keywarden — an embeddable API key management engine.
//!
//! Keywarden handles the full lifecycle of API keys: generation,
//! hashing, storage, validation, rotation, suspension, revocation, and
//! usage analytics. Raw keys are never persisted — only their hashes
//! are stored, and the raw key is returned exactly once at creation or
//! rotation. Every operation is implicitly scoped to the
//! `(app_id, tenant_id)` pair attached to the ambient context.
//!
//! # Quick start
//!
//! Build an engine over the in-memory store (swap in a database-backed
//! [`domain::Store`] in production):
//!
//! ```
//! use std::sync::Arc;
//! use keywarden::{context, CreateKeyInput, Engine};
//! use keywarden::infrastructure::memory::MemoryStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), keywarden::Error> {
//! let engine = Engine::builder()
//!     .with_store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! let result = context::with_tenant("my-app", "tenant-1", async {
//!     engine
//!         .create_key(CreateKeyInput::new("Production Key").with_prefix("sk"))
//!         .await
//! })
//! .await?;
//! println!("{}", result.raw_key); // shown once — save it
//!
//! let validated = engine.validate_key(&result.raw_key).await?;
//! assert_eq!(validated.key.id, result.key.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The engine coordinates five subsystems, each behind a pluggable
//! repository composed under one [`domain::Store`] facade:
//!
//! - `key` — the core entity and its lifecycle state machine
//!   (active / rotated / suspended / expired / revoked)
//! - `policy` — rate limits, allowlists, lifetime and grace constraints
//! - `scope` — named permission scopes assignable to keys
//! - `usage` — per-request usage records and the aggregation read model
//! - `rotation` — rotation history with grace-period tracking
//!
//! # Plug-ins
//!
//! Lifecycle observers implement [`domain::Plugin`], advertising the
//! [`domain::HookKind`]s they subscribe to. The hook manager dispatches
//! in registration order and a plug-in failure never destabilises key
//! operations. [`infrastructure::audit::AuditPlugin`] is the built-in
//! reference, emitting a structured audit trail.

pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use config::EngineConfig;
pub use context::TenantScope;
pub use domain::{
    Environment, Error, HookKind, HookManager, Id, Key, KeyFilter, KeyState, Plugin, Policy,
    PolicyFilter, Result, RotationFilter, RotationReason, RotationRecord, Scope, ScopeFilter,
    Store, UsageAggregation, UsageFilter, UsageRecord,
};
pub use engine::{CreateKeyInput, CreateKeyResult, Engine, EngineBuilder, ValidationResult};
