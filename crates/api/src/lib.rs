//! HTTP API for session recording and habit enrichment.

pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
