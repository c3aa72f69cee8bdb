//! Store traits and the scoped write helper.

use async_trait::async_trait;
use habit_core::{DateKey, Error, HabitMetrics, Result, Session};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Operations available inside one scoped write.
///
/// Everything done through a `StoreTxn` is committed together when the task
/// returns `Ok`, and discarded when it returns `Err`.
pub trait StoreTxn {
    fn find_sessions(&mut self, date: DateKey) -> Result<Vec<Session>>;

    fn find_habit_metrics(&mut self, date: DateKey) -> Result<Vec<HabitMetrics>>;

    fn insert_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()>;

    fn update_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()>;

    /// Sets a session's habit metrics reference.
    fn attach_habit_metrics(&mut self, session_id: Uuid, habit_metrics_id: Uuid) -> Result<()>;
}

/// A unit of work run by [`SessionStore::run_exclusive`].
pub type WriteTask = Box<dyn FnOnce(&mut dyn StoreTxn) -> Result<()> + Send + 'static>;

/// Persistent store for sessions and habit metrics.
///
/// Dates carry no uniqueness constraint: several sessions or habit metrics
/// records may share one date key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Saves a base session.
    async fn insert_session(&self, session: &Session) -> Result<()>;

    /// All sessions filed under `date`, oldest first.
    async fn find_sessions(&self, date: DateKey) -> Result<Vec<Session>>;

    /// All habit metrics records for `date`, oldest first.
    async fn find_habit_metrics(&self, date: DateKey) -> Result<Vec<HabitMetrics>>;

    /// Sessions with no habit metrics reference, oldest date first.
    async fn find_unlinked_sessions(&self, limit: usize) -> Result<Vec<Session>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Runs `task` as one transaction on the store's serialized execution
    /// context. Task errors are returned unchanged after rollback; commit
    /// failures surface as `Error::Persistence`.
    async fn run_exclusive(&self, task: WriteTask) -> Result<()>;
}

impl<'a> dyn SessionStore + 'a {
    /// Typed wrapper over [`SessionStore::run_exclusive`] that hands back the
    /// task's output once the transaction has committed.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StoreTxn) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.run_exclusive(Box::new(move |txn| {
            let output = f(txn)?;
            // Receiver lives until run_exclusive returns.
            let _ = reply_tx.send(output);
            Ok(())
        }))
        .await?;

        reply_rx
            .await
            .map_err(|_| Error::internal("write task finished without producing a result"))
    }
}
