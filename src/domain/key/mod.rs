//! API key entity, lifecycle states, and persistence contract.

mod entity;
mod repository;

pub use entity::{Environment, Key, KeyFilter, KeyState};
pub use repository::KeyRepository;
