//! Rotation records and their persistence contract.

mod entity;
mod repository;

pub use entity::{RotationFilter, RotationReason, RotationRecord};
pub use repository::RotationRepository;
