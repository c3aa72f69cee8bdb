//! Concurrent fan-out over the metric sources.
//!
//! Every metric in [`MetricKind::ALL`] is fetched on its own task. Each task
//! writes its result and decrements the outstanding count under one mutex,
//! and whichever task brings the count to zero delivers the merged outcome.

use habit_core::{
    DateRange, Error, FetchOutcome, FetchStatus, MetricFetchError, MetricKind, MetricSource,
    MetricValues, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Shared state of one fan-out. Never shared across invocations.
struct Gather {
    outcome: FetchOutcome,
    remaining: usize,
    reply: Option<oneshot::Sender<FetchOutcome>>,
}

impl Gather {
    fn new(expected: usize, reply: oneshot::Sender<FetchOutcome>) -> Self {
        Self {
            outcome: FetchOutcome::default(),
            remaining: expected,
            reply: Some(reply),
        }
    }

    /// Records one completion and, if it was the last, delivers the outcome.
    fn complete(&mut self, kind: MetricKind, result: std::result::Result<f64, MetricFetchError>) {
        self.outcome.record(kind, result);
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 {
            if let Some(reply) = self.reply.take() {
                let _ = reply.send(std::mem::take(&mut self.outcome));
            }
        }
    }
}

/// Gathers habit metrics from a metric source.
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn MetricSource>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    /// Fetches every metric concurrently and returns the merged outcome once
    /// all of them have reported, whatever order they finish in.
    pub async fn gather(&self, range: DateRange) -> Result<FetchOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let gather = Arc::new(Mutex::new(Gather::new(MetricKind::ALL.len(), reply_tx)));

        for kind in MetricKind::ALL {
            let source = Arc::clone(&self.source);
            let gather = Arc::clone(&gather);

            tokio::spawn(async move {
                let result = source.fetch(kind, range).await;

                metrics().metric_fetches.inc();
                match &result {
                    Ok(value) => debug!(metric = %kind, value, "Metric fetched"),
                    Err(e) => {
                        metrics().metric_fetch_errors.inc();
                        warn!(metric = %kind, error = %e, "Metric fetch failed");
                    }
                }

                gather.lock().complete(kind, result);
            });
        }

        // Only the fetch tasks may hold the sender now; if they all die the
        // receiver sees the drop instead of waiting forever.
        drop(gather);

        reply_rx
            .await
            .map_err(|_| Error::internal("metric fetch task ended without reporting"))
    }

    /// Gathers habit metrics for `range`.
    ///
    /// Succeeds with failed metrics zeroed unless every metric failed, in
    /// which case it returns `Error::AllMetricsUnavailable`.
    pub async fn gather_habit_metrics(&self, range: DateRange) -> Result<MetricValues> {
        let date = range.date_key();
        let started = Instant::now();

        info!(
            date = %date,
            source = self.source.name(),
            metrics = ?MetricKind::ALL.map(|k| k.name()),
            "Metric fetch started"
        );

        let outcome = self.gather(range).await?;
        metrics()
            .gather_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match outcome.status() {
            FetchStatus::Complete => {
                debug!(date = %date, "All metrics fetched");
            }
            FetchStatus::Partial => {
                metrics().gathers_partial.inc();
                let failed: Vec<_> = outcome.failed_metrics().iter().map(|k| k.name()).collect();
                warn!(date = %date, failed = ?failed, "Partial metric failure");
            }
            FetchStatus::Failed => {
                metrics().gathers_failed.inc();
                warn!(date = %date, "All metrics unavailable");
            }
        }

        outcome.into_values(date)
    }
}
