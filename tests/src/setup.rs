//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use habit_core::{DateKey, Session};
use session_store::{MemoryStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use worker::SessionPipeline;

use crate::mocks::MockMetricSource;

/// Test context with an in-memory store and a mock metric provider.
///
/// This exercises the production code paths by:
/// - Using the real Axum router with all middleware
/// - Using the real `SessionPipeline`, aggregator and linker
/// - Using `MockMetricSource`, which implements `MetricSource`
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub source: MockMetricSource,
    pub pipeline: Arc<SessionPipeline>,
    pub router: Router,
}

impl TestContext {
    /// Create a context whose provider answers every metric.
    pub fn new() -> Self {
        Self::with_source(MockMetricSource::healthy(8500.0, 45.0, 120.0))
    }

    pub fn with_source(source: MockMetricSource) -> Self {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(SessionPipeline::new(
            store.clone(),
            Arc::new(source.clone()),
        ));
        let router = router(AppState::new(pipeline.clone()));

        Self {
            store,
            source,
            pipeline,
            router,
        }
    }

    pub async fn sessions(&self, date: DateKey) -> Vec<Session> {
        self.store
            .find_sessions(date)
            .await
            .expect("Failed to read sessions")
    }

    /// Wait until every session for `date` is linked, or panic after a few seconds.
    ///
    /// For triggers whose enrichment handle the caller cannot see, such as the
    /// HTTP endpoints.
    pub async fn wait_for_link(&self, date: DateKey) -> Vec<Session> {
        for _ in 0..100 {
            let sessions = self.sessions(date).await;
            if !sessions.is_empty() && sessions.iter().all(Session::is_enriched) {
                return sessions;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("sessions for {date} were never linked");
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
