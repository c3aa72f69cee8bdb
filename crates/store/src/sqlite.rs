//! SQLite store on a dedicated connection thread.
//!
//! The connection never leaves its worker thread. Callers submit closures
//! over a command channel and await the reply on a oneshot, so every
//! statement (and every write transaction) runs strictly one at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habit_core::{DateKey, Error, HabitMetrics, MetricValues, Result, Session};
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{error, info};
use uuid::Uuid;

use crate::store::{SessionStore, StoreTxn, WriteTask};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS habit_metrics (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    steps REAL NOT NULL DEFAULT 0,
    exercise_time REAL NOT NULL DEFAULT 0,
    time_in_daylight REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_habit_metrics_date ON habit_metrics(date);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT NOT NULL,
    sleep TEXT NOT NULL DEFAULT 'null',
    habit_metrics_id TEXT REFERENCES habit_metrics(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
";

const SESSION_COLUMNS: &str =
    "id, date, started_at, ended_at, sleep, habit_metrics_id, created_at, updated_at";

const HABIT_METRICS_COLUMNS: &str =
    "id, date, steps, exercise_time, time_in_daylight, created_at, updated_at";

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<DbCommand>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            if let Err(e) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {}", e);
            }
            if handle.join().is_err() {
                error!("Store thread panicked during shutdown");
            }
        }
    }
}

fn db_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
    move |e| Error::persistence(context, e)
}

fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::persistence(format!("failed to parse {field}"), e))
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::persistence(format!("failed to parse {field}"), e))
}

fn parse_date(value: &str) -> Result<DateKey> {
    value.parse()
}

/// Raw `sessions` row before type conversion.
struct SessionRow {
    id: String,
    date: String,
    started_at: String,
    ended_at: String,
    sleep: String,
    habit_metrics_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            date: row.get("date")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            sleep: row.get("sleep")?,
            habit_metrics_id: row.get("habit_metrics_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: parse_uuid(&self.id, "id")?,
            date: parse_date(&self.date)?,
            started_at: parse_datetime(&self.started_at, "started_at")?,
            ended_at: parse_datetime(&self.ended_at, "ended_at")?,
            sleep: serde_json::from_str(&self.sleep)?,
            habit_metrics_id: self
                .habit_metrics_id
                .as_deref()
                .map(|id| parse_uuid(id, "habit_metrics_id"))
                .transpose()?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// Raw `habit_metrics` row before type conversion.
struct HabitMetricsRow {
    id: String,
    date: String,
    steps: f64,
    exercise_time: f64,
    time_in_daylight: f64,
    created_at: String,
    updated_at: String,
}

impl HabitMetricsRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            date: row.get("date")?,
            steps: row.get("steps")?,
            exercise_time: row.get("exercise_time")?,
            time_in_daylight: row.get("time_in_daylight")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_habit_metrics(self) -> Result<HabitMetrics> {
        Ok(HabitMetrics {
            id: parse_uuid(&self.id, "id")?,
            date: parse_date(&self.date)?,
            values: MetricValues::new(self.steps, self.exercise_time, self.time_in_daylight),
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

fn select_sessions<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions {clause}");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(db_err("failed to prepare session query"))?;
    let rows = stmt
        .query_map(params, SessionRow::from_row)
        .map_err(db_err("failed to query sessions"))?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row.map_err(db_err("failed to read session row"))?.into_session()?);
    }
    Ok(sessions)
}

fn select_habit_metrics(conn: &Connection, date: DateKey) -> Result<Vec<HabitMetrics>> {
    let sql = format!(
        "SELECT {HABIT_METRICS_COLUMNS} FROM habit_metrics WHERE date = ?1 ORDER BY created_at"
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(db_err("failed to prepare habit metrics query"))?;
    let rows = stmt
        .query_map(params![date.to_string()], HabitMetricsRow::from_row)
        .map_err(db_err("failed to query habit metrics"))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(
            row.map_err(db_err("failed to read habit metrics row"))?
                .into_habit_metrics()?,
        );
    }
    Ok(records)
}

/// Write-side view over an open SQLite transaction.
struct SqliteTxn<'c> {
    conn: &'c Connection,
}

impl StoreTxn for SqliteTxn<'_> {
    fn find_sessions(&mut self, date: DateKey) -> Result<Vec<Session>> {
        select_sessions(
            self.conn,
            "WHERE date = ?1 ORDER BY started_at",
            params![date.to_string()],
        )
    }

    fn find_habit_metrics(&mut self, date: DateKey) -> Result<Vec<HabitMetrics>> {
        select_habit_metrics(self.conn, date)
    }

    fn insert_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO habit_metrics (id, date, steps, exercise_time, time_in_daylight, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.date.to_string(),
                    record.values.steps,
                    record.values.exercise_time,
                    record.values.time_in_daylight,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err("failed to insert habit metrics"))?;
        Ok(())
    }

    fn update_habit_metrics(&mut self, record: &HabitMetrics) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE habit_metrics
                 SET steps = ?1,
                     exercise_time = ?2,
                     time_in_daylight = ?3,
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    record.values.steps,
                    record.values.exercise_time,
                    record.values.time_in_daylight,
                    record.updated_at.to_rfc3339(),
                    record.id.to_string(),
                ],
            )
            .map_err(db_err("failed to update habit metrics"))?;

        if updated == 0 {
            return Err(Error::internal(format!(
                "habit metrics {} does not exist",
                record.id
            )));
        }
        Ok(())
    }

    fn attach_habit_metrics(&mut self, session_id: Uuid, habit_metrics_id: Uuid) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE sessions
                 SET habit_metrics_id = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    habit_metrics_id.to_string(),
                    Utc::now().to_rfc3339(),
                    session_id.to_string(),
                ],
            )
            .map_err(db_err("failed to link session"))?;

        if updated == 0 {
            return Err(Error::internal(format!("session {session_id} does not exist")));
        }
        Ok(())
    }
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::persistence(
                    format!("failed to create database directory {}", parent.display()),
                    e,
                )
            })?;
        }

        info!(path = %path.display(), "Opening SQLite store");
        Self::spawn(move || Connection::open(&path))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn(Connection::open_in_memory)
    }

    fn spawn<F>(open: F) -> Result<Self>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let worker = thread::Builder::new()
            .name("session-store".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::persistence("failed to open SQLite database", e)));
                        return;
                    }
                };

                if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {}", e);
                }
                if let Err(e) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {}", e);
                }

                let init = conn
                    .execute_batch(SCHEMA)
                    .map_err(db_err("failed to initialize schema"));
                if ready_tx.send(init).is_err() {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .map_err(|e| Error::persistence("failed to spawn store thread", e))?;

        ready_rx
            .recv()
            .map_err(|_| Error::internal("store thread exited before signaling readiness"))??;

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: parking_lot::Mutex::new(Some(worker)),
            }),
        })
    }

    /// Runs `task` on the connection thread and awaits its result.
    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| Error::internal("store thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| Error::internal("store thread terminated unexpectedly"))?
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        let sleep = serde_json::to_string(&record.sleep)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, date, started_at, ended_at, sleep, habit_metrics_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.date.to_string(),
                    record.started_at.to_rfc3339(),
                    record.ended_at.to_rfc3339(),
                    sleep,
                    record.habit_metrics_id.map(|id| id.to_string()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err("failed to insert session"))?;
            Ok(())
        })
        .await
    }

    async fn find_sessions(&self, date: DateKey) -> Result<Vec<Session>> {
        self.execute(move |conn| {
            select_sessions(
                conn,
                "WHERE date = ?1 ORDER BY started_at",
                params![date.to_string()],
            )
        })
        .await
    }

    async fn find_habit_metrics(&self, date: DateKey) -> Result<Vec<HabitMetrics>> {
        self.execute(move |conn| select_habit_metrics(conn, date))
            .await
    }

    async fn find_unlinked_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            select_sessions(
                conn,
                "WHERE habit_metrics_id IS NULL ORDER BY date, started_at LIMIT ?1",
                params![limit],
            )
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.execute(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(db_err("store ping failed"))?;
            Ok(())
        })
        .await
    }

    async fn run_exclusive(&self, task: WriteTask) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_err("failed to begin transaction"))?;

            // Dropping `tx` on the error path rolls back.
            task(&mut SqliteTxn { conn: &tx })?;

            tx.commit().map_err(db_err("failed to commit transaction"))
        })
        .await
    }
}
