//! Mock implementations for testing.

use async_trait::async_trait;
use habit_core::{DateRange, MetricFetchError, MetricKind, MetricSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How the mock answers one metric.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(f64),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Entry {
    reply: Reply,
    delay: Option<Duration>,
}

/// Metric source answering from a per-metric table.
///
/// Implements the same `MetricSource` trait as `HttpMetricSource`, so the
/// pipeline runs its production path without a provider on the network.
/// Metrics with no entry fail.
#[derive(Clone, Default)]
pub struct MockMetricSource {
    entries: Arc<Mutex<HashMap<MetricKind, Entry>>>,
    calls: Arc<Mutex<Vec<(MetricKind, DateRange)>>>,
}

impl MockMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers steps, exercise time and daylight time with the given values.
    pub fn healthy(steps: f64, exercise_time: f64, time_in_daylight: f64) -> Self {
        let source = Self::new();
        source.set_value(MetricKind::Steps, steps);
        source.set_value(MetricKind::ExerciseTime, exercise_time);
        source.set_value(MetricKind::TimeInDaylight, time_in_daylight);
        source
    }

    pub fn set_value(&self, kind: MetricKind, value: f64) {
        self.set(kind, Reply::Value(value), None);
    }

    pub fn set_failure(&self, kind: MetricKind, message: &str) {
        self.set(kind, Reply::Fail(message.to_string()), None);
    }

    /// Fails every metric.
    pub fn fail_all(&self) {
        for kind in MetricKind::ALL {
            self.set_failure(kind, "provider unavailable");
        }
    }

    /// Holds the answer for `kind` back by `delay`.
    pub fn set_delay(&self, kind: MetricKind, delay: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(&kind) {
            entry.delay = Some(delay);
        }
    }

    fn set(&self, kind: MetricKind, reply: Reply, delay: Option<Duration>) {
        self.entries.lock().insert(kind, Entry { reply, delay });
    }

    /// Number of fetches issued for `kind`.
    pub fn call_count(&self, kind: MetricKind) -> usize {
        self.calls.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Every range the mock was asked about, in call order.
    pub fn requested_ranges(&self) -> Vec<DateRange> {
        self.calls.lock().iter().map(|(_, range)| *range).collect()
    }
}

#[async_trait]
impl MetricSource for MockMetricSource {
    async fn fetch(&self, metric: MetricKind, range: DateRange) -> Result<f64, MetricFetchError> {
        self.calls.lock().push((metric, range));
        let entry = self.entries.lock().get(&metric).cloned();

        let Some(entry) = entry else {
            return Err(MetricFetchError::new(metric, "no mock reply configured"));
        };
        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }

        match entry.reply {
            Reply::Value(value) => Ok(value),
            Reply::Fail(message) => Err(MetricFetchError::new(metric, message)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_mock_replies_and_counts() {
        let source = MockMetricSource::healthy(1.0, 2.0, 3.0);
        source.set_failure(MetricKind::Steps, "down");

        let range = fixtures::night();
        assert!(source.fetch(MetricKind::Steps, range).await.is_err());
        assert_eq!(source.fetch(MetricKind::ExerciseTime, range).await.unwrap(), 2.0);
        assert_eq!(source.call_count(MetricKind::Steps), 1);
        assert_eq!(source.requested_ranges(), vec![range, range]);
    }

    #[tokio::test]
    async fn test_unconfigured_metric_fails() {
        let source = MockMetricSource::new();
        let err = source
            .fetch(MetricKind::TimeInDaylight, fixtures::night())
            .await
            .unwrap_err();
        assert_eq!(err.metric, MetricKind::TimeInDaylight);
    }
}
