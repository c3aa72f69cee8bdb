//! Logging and in-process metrics for habit enrichment.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
