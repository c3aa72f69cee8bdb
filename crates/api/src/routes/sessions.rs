//! Session recording and enrichment endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use habit_core::{DateKey, DateRange, Error};
use serde::Deserialize;
use session_store::SessionStore;
use tracing::info;
use worker::{BackfillReport, BackfillWorker};

use crate::response::{ApiError, DaySummary, EnrichmentAccepted, EnrichmentStatus, SessionAccepted};
use crate::state::AppState;

const DEFAULT_BACKFILL_LIMIT: usize = 500;

/// Body of `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub sleep: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct BackfillParams {
    pub limit: Option<usize>,
}

/// POST /sessions - Save a session and schedule its enrichment.
///
/// Answers as soon as the base session is stored.
pub async fn create_session_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionAccepted>), ApiError> {
    let range = DateRange::new(request.start, request.end)?;
    let recorded = state.pipeline.record_session(range, request.sleep).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SessionAccepted {
            enrichment: EnrichmentStatus::from(&recorded.enrichment),
            session: recorded.session,
        }),
    ))
}

/// GET /sessions/:date - Sessions and habit metrics stored for a date.
pub async fn get_sessions_handler(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DaySummary>, ApiError> {
    let date: DateKey = date.parse()?;
    let sessions = state.store().find_sessions(date).await?;
    let habit_metrics = state.store().find_habit_metrics(date).await?;

    Ok(Json(DaySummary {
        date,
        sessions,
        habit_metrics,
    }))
}

/// POST /sessions/:date/enrich - Re-trigger enrichment for a date.
pub async fn enrich_handler(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<(StatusCode, Json<EnrichmentAccepted>), ApiError> {
    let date: DateKey = date.parse()?;
    let sessions = state.store().find_sessions(date).await?;
    let session = sessions.first().ok_or(Error::SessionNotFound(date))?;

    let handle = state.pipeline.enrich_session(session.range()?);
    info!(date = %date, scheduled = handle.is_scheduled(), "Enrichment re-triggered");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnrichmentAccepted {
            date,
            enrichment: EnrichmentStatus::from(&handle),
        }),
    ))
}

/// POST /backfill - Re-enrich sessions that have no habit metrics.
pub async fn backfill_handler(
    State(state): State<AppState>,
    Query(params): Query<BackfillParams>,
) -> Result<Json<BackfillReport>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_BACKFILL_LIMIT);
    let report = BackfillWorker::new(state.pipeline.clone()).run(limit).await?;
    Ok(Json(report))
}
