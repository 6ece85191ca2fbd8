//! Permission scopes and their persistence contract.

mod entity;
mod repository;

pub use entity::{Scope, ScopeFilter};
pub use repository::ScopeRepository;
