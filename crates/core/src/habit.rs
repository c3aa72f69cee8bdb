//! Habit metrics: the fixed metric set, their values, and the persisted record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::date::DateKey;
use crate::error::{Error, MetricFetchError, Result};

/// One of the auxiliary metrics fetched from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    /// Step count
    Steps,
    /// Exercise duration in minutes
    ExerciseTime,
    /// Time spent in daylight in minutes
    TimeInDaylight,
}

impl MetricKind {
    /// The full fan-out set, in a stable order.
    pub const ALL: [MetricKind; 3] = [Self::Steps, Self::ExerciseTime, Self::TimeInDaylight];

    /// Provider-facing metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::ExerciseTime => "exerciseTime",
            Self::TimeInDaylight => "timeInDaylight",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three observed amounts for a date. Missing metrics read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub steps: f64,
    pub exercise_time: f64,
    pub time_in_daylight: f64,
}

impl MetricValues {
    pub fn new(steps: f64, exercise_time: f64, time_in_daylight: f64) -> Self {
        Self {
            steps,
            exercise_time,
            time_in_daylight,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::Steps => self.steps = value,
            MetricKind::ExerciseTime => self.exercise_time = value,
            MetricKind::TimeInDaylight => self.time_in_daylight = value,
        }
    }
}

/// Persisted habit metrics for one day.
///
/// Several sessions filed under the same day may point at one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitMetrics {
    pub id: Uuid,
    pub date: DateKey,
    #[serde(flatten)]
    pub values: MetricValues,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitMetrics {
    pub fn new(date: DateKey, values: MetricValues) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            values,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the values in place, keeping the record identity.
    pub fn overwrite(&mut self, values: MetricValues) {
        self.values = values;
        self.updated_at = Utc::now();
    }
}

/// Terminal classification of a completed fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    Partial,
    Failed,
}

/// Merged results of one fan-out once every source has reported.
///
/// A failed metric appears in both maps: its error under `errors` and a 0
/// under `results`.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub results: BTreeMap<MetricKind, f64>,
    pub errors: BTreeMap<MetricKind, MetricFetchError>,
}

impl FetchOutcome {
    /// Records one source completion.
    pub fn record(&mut self, kind: MetricKind, result: std::result::Result<f64, MetricFetchError>) {
        match result {
            Ok(value) => {
                self.results.insert(kind, value);
            }
            Err(err) => {
                self.results.insert(kind, 0.0);
                self.errors.insert(kind, err);
            }
        }
    }

    /// Number of metrics that have reported so far.
    pub fn reported(&self) -> usize {
        self.results.len()
    }

    pub fn status(&self) -> FetchStatus {
        match self.errors.len() {
            0 => FetchStatus::Complete,
            n if n >= MetricKind::ALL.len() => FetchStatus::Failed,
            _ => FetchStatus::Partial,
        }
    }

    pub fn failed_metrics(&self) -> Vec<MetricKind> {
        self.errors.keys().copied().collect()
    }

    /// Applies the decision rule: every metric failed is an error, anything
    /// else yields values with failed metrics zeroed.
    pub fn into_values(self, date: DateKey) -> Result<MetricValues> {
        if self.status() == FetchStatus::Failed {
            return Err(Error::AllMetricsUnavailable {
                date,
                errors: self.errors,
            });
        }

        let mut values = MetricValues::default();
        for (kind, value) in self.results {
            values.set(kind, value);
        }
        Ok(values)
    }
}
