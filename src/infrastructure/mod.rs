//! Infrastructure layer: reference adapters for the domain seams.

pub mod audit;
pub mod logging;
pub mod memory;
pub mod rate_limiter;
