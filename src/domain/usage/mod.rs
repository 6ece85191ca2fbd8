//! Usage records, the aggregation read model, and their persistence contract.

mod record;
mod repository;

pub use record::{UsageAggregation, UsageFilter, UsageRecord};
pub use repository::UsageRepository;
