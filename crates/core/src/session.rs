//! Session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date::{DateKey, DateRange};
use crate::error::Result;

/// A recorded sleep session.
///
/// One per calendar day is typical, but nothing enforces it; several
/// sessions may share a date key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: Uuid,
    /// Day the session is filed under
    pub date: DateKey,
    /// Session start time
    pub started_at: DateTime<Utc>,
    /// Session end time
    pub ended_at: DateTime<Utc>,
    /// Sleep-period payload from the producer, stored as-is
    #[serde(default)]
    pub sleep: serde_json::Value,
    /// Linked habit metrics, once enrichment succeeds
    pub habit_metrics_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new, unlinked session for the given range.
    pub fn new(range: DateRange, sleep: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date: range.date_key(),
            started_at: range.start(),
            ended_at: range.end(),
            sleep,
            habit_metrics_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The observation window this session covers.
    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.started_at, self.ended_at)
    }

    pub fn is_enriched(&self) -> bool {
        self.habit_metrics_id.is_some()
    }

    /// Points the session at a habit metrics record.
    pub fn link(&mut self, habit_metrics_id: Uuid) {
        self.habit_metrics_id = Some(habit_metrics_id);
        self.updated_at = Utc::now();
    }
}
