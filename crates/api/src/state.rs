//! Application state shared across handlers.

use session_store::SessionStore;
use std::sync::Arc;
use worker::SessionPipeline;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SessionPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SessionPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.pipeline.store()
    }
}
