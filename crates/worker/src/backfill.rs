//! Operator-triggered re-enrichment of unlinked sessions.
//!
//! Finds sessions that never received habit metrics and re-triggers
//! enrichment once per distinct date. This is an explicit re-run, not a
//! retry policy: nothing schedules it automatically.

use habit_core::Result;
use serde::Serialize;
use session_store::SessionStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::SessionPipeline;

/// Counts from one backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Distinct dates considered
    pub dates: usize,
    pub linked: usize,
    pub failed: usize,
    /// Dates skipped because an enrichment was already running
    pub coalesced: usize,
}

/// Re-enriches sessions that have no habit metrics.
pub struct BackfillWorker {
    pipeline: Arc<SessionPipeline>,
}

impl BackfillWorker {
    pub fn new(pipeline: Arc<SessionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Runs one pass over at most `limit` unlinked sessions, one date at a time.
    pub async fn run(&self, limit: usize) -> Result<BackfillReport> {
        let sessions = self.pipeline.store().find_unlinked_sessions(limit).await?;
        let mut seen = HashSet::new();
        let mut report = BackfillReport::default();

        for session in sessions {
            if !seen.insert(session.date) {
                continue;
            }
            report.dates += 1;

            let range = match session.range() {
                Ok(range) => range,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Skipping session with invalid range");
                    report.failed += 1;
                    continue;
                }
            };

            match self.pipeline.enrich_session(range).outcome().await {
                Some(Ok(_)) => report.linked += 1,
                Some(Err(_)) => report.failed += 1,
                None => report.coalesced += 1,
            }
        }

        info!(
            dates = report.dates,
            linked = report.linked,
            failed = report.failed,
            coalesced = report.coalesced,
            "Backfill pass complete"
        );
        Ok(report)
    }
}
