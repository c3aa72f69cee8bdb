//! Core types, errors, and the metric source contract for habit enrichment.

pub mod date;
pub mod error;
pub mod habit;
pub mod session;
pub mod source;

pub use date::*;
pub use error::{BoxError, Error, ErrorCode, MetricFetchError, Result};
pub use habit::*;
pub use session::*;
pub use source::MetricSource;
