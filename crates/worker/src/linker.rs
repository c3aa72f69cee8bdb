//! Links gathered habit metrics to the day's sessions.

use habit_core::{DateKey, Error, HabitMetrics, MetricValues, Result};
use serde::Serialize;
use session_store::{SessionStore, StoreTxn};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;
use uuid::Uuid;

/// What a successful link did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkReceipt {
    pub date: DateKey,
    pub habit_metrics_id: Uuid,
    /// Whether a new habit metrics record was created
    pub created: bool,
    pub sessions_linked: usize,
}

/// Applies habit metrics to persisted sessions.
#[derive(Clone)]
pub struct Linker {
    store: Arc<dyn SessionStore>,
}

impl Linker {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Finds or creates the day's habit metrics record, overwrites its values,
    /// and points every session for `date` at it.
    ///
    /// Runs as one scoped write on the store's serialized context, so two
    /// links for the same date never interleave between lookup and commit,
    /// and a missing session leaves nothing behind.
    pub async fn link_and_save(&self, date: DateKey, values: MetricValues) -> Result<LinkReceipt> {
        let started = Instant::now();
        let result = self.store.write(move |txn| link(txn, date, values)).await;
        metrics()
            .link_latency_ms
            .observe(started.elapsed().as_millis() as u64);
        result
    }
}

fn link(txn: &mut dyn StoreTxn, date: DateKey, values: MetricValues) -> Result<LinkReceipt> {
    let existing = txn.find_habit_metrics(date)?;
    if existing.len() > 1 {
        debug!(date = %date, count = existing.len(), "Multiple habit metrics records, reusing oldest");
    }

    let (record, created) = match existing.into_iter().next() {
        Some(mut record) => {
            record.overwrite(values);
            txn.update_habit_metrics(&record)?;
            (record, false)
        }
        None => {
            let record = HabitMetrics::new(date, values);
            txn.insert_habit_metrics(&record)?;
            (record, true)
        }
    };

    let sessions = txn.find_sessions(date)?;
    if sessions.is_empty() {
        return Err(Error::SessionNotFound(date));
    }

    for session in &sessions {
        txn.attach_habit_metrics(session.id, record.id)?;
    }

    Ok(LinkReceipt {
        date,
        habit_metrics_id: record.id,
        created,
        sessions_linked: sessions.len(),
    })
}
