//! Habit metric enrichment workers.
//!
//! - Aggregator (concurrent fan-out over the metric sources)
//! - Linker (scoped find-or-create and session linking)
//! - Pipeline (two-phase save: persist, then enrich in the background)
//! - Backfill (operator-triggered re-enrichment)

pub mod aggregator;
pub mod backfill;
pub mod linker;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use aggregator::Aggregator;
pub use backfill::{BackfillReport, BackfillWorker};
pub use linker::{LinkReceipt, Linker};
pub use pipeline::{EnrichmentHandle, RecordedSession, SessionPipeline};
