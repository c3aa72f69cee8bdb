//! Contract for external metric providers.

use async_trait::async_trait;

use crate::date::DateRange;
use crate::error::MetricFetchError;
use crate::habit::MetricKind;

/// An asynchronous provider of one named numeric observation.
///
/// Each call completes exactly once, on whatever task or thread the
/// implementation chooses. Implementations must not block the caller and
/// have no side effects beyond producing a value.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the amount of `metric` observed over `range`.
    async fn fetch(&self, metric: MetricKind, range: DateRange) -> Result<f64, MetricFetchError>;

    /// Short label for diagnostics.
    fn name(&self) -> &'static str {
        "metric-source"
    }
}
