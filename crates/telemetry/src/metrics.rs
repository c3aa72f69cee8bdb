//! In-process enrichment metrics.
//!
//! Lock-free counters and latency histograms behind one global registry,
//! readable as a serializable snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that moves both ways.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturate at zero rather than wrap.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 5ms, 25ms, 100ms, 500ms, 1s, 5s, 30s, +inf
    buckets: [AtomicU64; 8],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 7] = [5, 25, 100, 500, 1_000, 5_000, 30_000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// Bucket counts keyed by upper bound; `None` is the overflow bucket.
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .map(|&b| Some(b))
            .chain(std::iter::once(None))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for habit enrichment.
#[derive(Debug, Default)]
pub struct Metrics {
    // Phase 1
    pub sessions_saved: Counter,

    // Phase 2 triggers
    pub enrichments_started: Counter,
    pub enrichments_coalesced: Counter,
    pub enrichments_in_flight: Gauge,

    // Provider fan-out
    pub metric_fetches: Counter,
    pub metric_fetch_errors: Counter,
    pub gathers_partial: Counter,
    pub gathers_failed: Counter,

    // Linking
    pub links_succeeded: Counter,
    pub link_errors: Counter,

    // Latency histograms
    pub gather_latency_ms: Histogram,
    pub link_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sessions_saved: u64,
    pub enrichments_started: u64,
    pub enrichments_coalesced: u64,
    pub enrichments_in_flight: u64,
    pub metric_fetches: u64,
    pub metric_fetch_errors: u64,
    pub gathers_partial: u64,
    pub gathers_failed: u64,
    pub links_succeeded: u64,
    pub link_errors: u64,
    pub gather_latency_mean_ms: f64,
    pub link_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            sessions_saved: self.sessions_saved.get(),
            enrichments_started: self.enrichments_started.get(),
            enrichments_coalesced: self.enrichments_coalesced.get(),
            enrichments_in_flight: self.enrichments_in_flight.get(),
            metric_fetches: self.metric_fetches.get(),
            metric_fetch_errors: self.metric_fetch_errors.get(),
            gathers_partial: self.gathers_partial.get(),
            gathers_failed: self.gathers_failed.get(),
            links_succeeded: self.links_succeeded.get(),
            link_errors: self.link_errors.get(),
            gather_latency_mean_ms: self.gather_latency_ms.mean(),
            link_latency_mean_ms: self.link_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
