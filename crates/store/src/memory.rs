//! In-memory store.

use async_trait::async_trait;
use habit_core::{DateKey, Error, HabitMetrics, Result, Session};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::store::{SessionStore, StoreTxn, WriteTask};

#[derive(Debug, Clone, Default)]
struct Tables {
    sessions: Vec<Session>,
    habit_metrics: Vec<HabitMetrics>,
}

impl StoreTxn for Tables {
    fn find_sessions(&mut self, date: DateKey) -> Result<Vec<Session>> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|s| s.date == date)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    /// Oldest first, matching the SQLite store's `ORDER BY created_at`.
    fn find_habit_metrics(&mut self, date: DateKey) -> Result<Vec<HabitMetrics>> {
        let mut records: Vec<_> = self
            .habit_metrics
            .iter()
            .filter(|m| m.date == date)
            .cloned()
            .collect();
        records.sort_by_key(|m| m.created_at);
        Ok(records)
    }

    fn insert_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()> {
        self.habit_metrics.push(record.clone());
        Ok(())
    }

    fn update_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()> {
        let existing = self
            .habit_metrics
            .iter_mut()
            .find(|m| m.id == record.id)
            .ok_or_else(|| Error::internal(format!("habit metrics {} does not exist", record.id)))?;
        *existing = record.clone();
        Ok(())
    }

    fn attach_habit_metrics(&mut self, session_id: Uuid, habit_metrics_id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| Error::internal(format!("session {session_id} does not exist")))?;
        session.link(habit_metrics_id);
        Ok(())
    }
}

/// Store holding all records behind one mutex.
///
/// A write task runs against a staged copy of the tables that replaces the
/// live tables only when the task succeeds and the commit is accepted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every subsequent commit when set, for exercising failure paths.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().sessions.len()
    }

    pub fn habit_metrics_count(&self) -> usize {
        self.tables.lock().habit_metrics.len()
    }

    /// Removes every session for `date`, as an external deletion would.
    pub fn delete_sessions(&self, date: DateKey) -> usize {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.date != date);
        before - tables.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.tables.lock().sessions.push(session.clone());
        Ok(())
    }

    async fn find_sessions(&self, date: DateKey) -> Result<Vec<Session>> {
        self.tables.lock().find_sessions(date)
    }

    async fn find_habit_metrics(&self, date: DateKey) -> Result<Vec<HabitMetrics>> {
        self.tables.lock().find_habit_metrics(date)
    }

    async fn find_unlinked_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .tables
            .lock()
            .sessions
            .iter()
            .filter(|s| !s.is_enriched())
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.date, s.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn run_exclusive(&self, task: WriteTask) -> Result<()> {
        let mut tables = self.tables.lock();
        let mut staged = tables.clone();

        task(&mut staged)?;

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::persistence(
                "failed to commit transaction",
                "commit rejected by store",
            ));
        }

        *tables = staged;
        Ok(())
    }
}
