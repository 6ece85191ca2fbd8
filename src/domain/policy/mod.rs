//! Key policies and their persistence contract.

mod entity;
mod repository;

pub use entity::{Policy, PolicyFilter};
pub use repository::PolicyRepository;
