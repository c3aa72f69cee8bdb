//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use habit_core::{DateKey, HabitMetrics, Session};
use serde::{Deserialize, Serialize};
use worker::EnrichmentHandle;

/// Whether a trigger started a new enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Scheduled,
    Coalesced,
}

impl From<&EnrichmentHandle> for EnrichmentStatus {
    fn from(handle: &EnrichmentHandle) -> Self {
        if handle.is_scheduled() {
            Self::Scheduled
        } else {
            Self::Coalesced
        }
    }
}

/// Response to `POST /sessions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionAccepted {
    pub session: Session,
    pub enrichment: EnrichmentStatus,
}

/// Response to `POST /sessions/:date/enrich`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrichmentAccepted {
    pub date: DateKey,
    pub enrichment: EnrichmentStatus,
}

/// Everything stored for one date.
#[derive(Debug, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: DateKey,
    pub sessions: Vec<Session>,
    pub habit_metrics: Vec<HabitMetrics>,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error carrying a stable error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse {
                error: msg.into(),
                code: code.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<habit_core::Error> for ApiError {
    fn from(err: habit_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError::with_code(status, err.code(), err.to_string())
    }
}
