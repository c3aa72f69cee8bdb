//! Scripted metric source for unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use habit_core::{DateRange, MetricFetchError, MetricKind, MetricSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Value(f64),
    Error(String),
    Panic,
}

/// Canned reply for one metric.
#[derive(Debug, Clone)]
pub struct Script {
    reply: Reply,
    delay: Duration,
}

impl Script {
    pub fn value(v: f64) -> Self {
        Self {
            reply: Reply::Value(v),
            delay: Duration::ZERO,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            reply: Reply::Error(msg.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn panic() -> Self {
        Self {
            reply: Reply::Panic,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<MetricKind, Script>,
    calls: Mutex<HashMap<MetricKind, usize>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: MetricKind, script: Script) -> Self {
        self.scripts.insert(kind, script);
        self
    }

    pub fn calls(&self, kind: MetricKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn fetch(&self, metric: MetricKind, _range: DateRange) -> Result<f64, MetricFetchError> {
        *self.calls.lock().entry(metric).or_default() += 1;

        let script = self
            .scripts
            .get(&metric)
            .cloned()
            .unwrap_or_else(|| Script::error("no script"));

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        match script.reply {
            Reply::Value(v) => Ok(v),
            Reply::Error(msg) => Err(MetricFetchError::new(metric, msg)),
            Reply::Panic => panic!("scripted panic for {metric}"),
        }
    }
}

pub fn range() -> DateRange {
    DateRange::new(
        Utc.with_ymd_and_hms(2024, 3, 8, 23, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 0, 0).unwrap(),
    )
    .unwrap()
}
