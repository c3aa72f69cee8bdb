//! Two-phase session save.
//!
//! Phase 1 persists the base session before anything else happens. Phase 2
//! runs on its own task: gather habit metrics, then link them. Phase 2
//! failures are logged and returned on the enrichment handle; they never
//! reach the phase 1 caller and never touch the saved session.

use habit_core::{DateKey, DateRange, Error, MetricSource, Result, Session};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::linker::{LinkReceipt, Linker};
use session_store::SessionStore;

/// Result of triggering phase 2.
#[derive(Debug)]
pub enum EnrichmentHandle {
    /// Enrichment is running on its own task.
    Scheduled(JoinHandle<Result<LinkReceipt>>),
    /// Another attempt for the same date is already in flight and will run
    /// once more when it finishes.
    Coalesced,
}

impl EnrichmentHandle {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }

    /// Waits for a scheduled attempt to finish. `None` if it was coalesced.
    pub async fn outcome(self) -> Option<Result<LinkReceipt>> {
        match self {
            Self::Scheduled(handle) => Some(
                handle
                    .await
                    .unwrap_or_else(|e| Err(Error::internal(format!("enrichment task failed: {e}")))),
            ),
            Self::Coalesced => None,
        }
    }
}

/// A saved session and its pending enrichment.
#[derive(Debug)]
pub struct RecordedSession {
    pub session: Session,
    pub enrichment: EnrichmentHandle,
}

/// Dates with an attempt in flight, flagged when a trigger was coalesced
/// into that attempt.
type InFlight = Arc<Mutex<HashMap<DateKey, bool>>>;

/// Claim on a date for the duration of one enrichment attempt.
struct InFlightGuard {
    in_flight: InFlight,
    date: DateKey,
    released: bool,
}

impl InFlightGuard {
    /// Releases the claim, unless a trigger was coalesced since the attempt
    /// started. In that case the flag is cleared, the claim is kept and
    /// `true` is returned: the attempt must run again.
    fn release_or_rerun(&mut self) -> bool {
        let mut in_flight = self.in_flight.lock();
        if let Some(rerun) = in_flight.get_mut(&self.date) {
            if std::mem::take(rerun) {
                return true;
            }
        }
        in_flight.remove(&self.date);
        self.released = true;
        false
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            self.in_flight.lock().remove(&self.date);
        }
        metrics().enrichments_in_flight.dec();
    }
}

/// Orchestrates phase 1 (save) and phase 2 (enrich).
pub struct SessionPipeline {
    store: Arc<dyn SessionStore>,
    aggregator: Aggregator,
    linker: Linker,
    in_flight: InFlight,
}

impl SessionPipeline {
    pub fn new(store: Arc<dyn SessionStore>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            aggregator: Aggregator::new(source),
            linker: Linker::new(store.clone()),
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Saves a new base session, then schedules its enrichment.
    ///
    /// Returns once the session is durable; enrichment continues in the
    /// background.
    pub async fn record_session(
        self: &Arc<Self>,
        range: DateRange,
        sleep: serde_json::Value,
    ) -> Result<RecordedSession> {
        let session = Session::new(range, sleep);
        self.store.insert_session(&session).await?;
        metrics().sessions_saved.inc();

        info!(session_id = %session.id, date = %session.date, "Session saved");

        let enrichment = self.enrich_session(range);
        Ok(RecordedSession {
            session,
            enrichment,
        })
    }

    /// Fire-and-forget enrichment trigger for the sessions filed under
    /// `range`'s date.
    ///
    /// A trigger for a date that already has an attempt in flight is
    /// coalesced into that attempt, which then runs once more before
    /// releasing the date. Sessions saved while the attempt was linking are
    /// picked up by that second run.
    pub fn enrich_session(self: &Arc<Self>, range: DateRange) -> EnrichmentHandle {
        let date = range.date_key();

        let Some(mut guard) = self.claim(date) else {
            metrics().enrichments_coalesced.inc();
            info!(date = %date, "Enrichment already in flight, coalesced");
            return EnrichmentHandle::Coalesced;
        };

        metrics().enrichments_started.inc();
        let pipeline = Arc::clone(self);
        EnrichmentHandle::Scheduled(tokio::spawn(async move {
            loop {
                let result = pipeline.run_enrichment(range).await;
                if !guard.release_or_rerun() {
                    return result;
                }
                info!(date = %date, "Enrichment re-run for coalesced trigger");
            }
        }))
    }

    /// Claims `date`, or flags the running attempt for a re-run.
    fn claim(&self, date: DateKey) -> Option<InFlightGuard> {
        match self.in_flight.lock().entry(date) {
            Entry::Occupied(mut entry) => {
                entry.insert(true);
                return None;
            }
            Entry::Vacant(entry) => {
                entry.insert(false);
            }
        }
        metrics().enrichments_in_flight.inc();
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            date,
            released: false,
        })
    }

    async fn run_enrichment(&self, range: DateRange) -> Result<LinkReceipt> {
        let date = range.date_key();

        let values = match self.aggregator.gather_habit_metrics(range).await {
            Ok(values) => values,
            Err(e) => {
                warn!(date = %date, code = e.code(), error = %e, "Enrichment skipped");
                return Err(e);
            }
        };

        match self.linker.link_and_save(date, values).await {
            Ok(receipt) => {
                metrics().links_succeeded.inc();
                info!(
                    date = %date,
                    habit_metrics_id = %receipt.habit_metrics_id,
                    created = receipt.created,
                    sessions = receipt.sessions_linked,
                    "Habit metrics linked"
                );
                Ok(receipt)
            }
            Err(e) => {
                metrics().link_errors.inc();
                error!(date = %date, code = e.code(), error = %e, "Habit metric link failed");
                Err(e)
            }
        }
    }
}
