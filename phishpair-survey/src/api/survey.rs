//! Participant flow endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::recorder::TrialInput;
use crate::session::{Demographics, DemographicsOutcome};
use crate::survey::TrialView;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub participant_id: Uuid,
    pub total_pairs: usize,
}

#[derive(Debug, Serialize)]
pub struct DemographicsResponse {
    pub status: DemographicsOutcome,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub participant_id: Uuid,
    pub status: &'static str,
}

fn participant_id(raw: &str) -> ApiResult<Uuid> {
    Ok(Uuid::parse_str(raw)?)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// POST /api/participants
pub async fn begin(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<ParticipantResponse>)> {
    let session = state.survey.begin().await?;
    Ok((
        StatusCode::CREATED,
        Json(ParticipantResponse {
            participant_id: session.participant_id(),
            total_pairs: session.total_pairs(),
        }),
    ))
}

/// POST /api/participants/:id/demographics
///
/// Non-string answers are stored in their JSON text form.
pub async fn record_demographics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<DemographicsResponse>> {
    let id = participant_id(&id)?;
    let data: Demographics = body(payload)?
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    let status = state.survey.record_demographics(id, data).await?;
    Ok(Json(DemographicsResponse { status }))
}

/// GET /api/participants/:id/trial
pub async fn trial(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TrialView>> {
    let id = participant_id(&id)?;
    Ok(Json(state.survey.trial_view(id).await?))
}

/// POST /api/participants/:id/trial
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TrialInput>, JsonRejection>,
) -> ApiResult<Json<TrialView>> {
    let id = participant_id(&id)?;
    let input = body(payload)?;
    Ok(Json(state.survey.submit(id, input).await?))
}

/// POST /api/participants/:id/reset
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResetResponse>> {
    let id = participant_id(&id)?;
    let session = state.survey.reset(id).await?;
    Ok(Json(ResetResponse {
        participant_id: session.participant_id(),
        status: "reset",
    }))
}

pub fn survey_routes() -> Router<AppState> {
    Router::new()
        .route("/api/participants", post(begin))
        .route("/api/participants/:id/demographics", post(record_demographics))
        .route("/api/participants/:id/trial", get(trial).post(submit))
        .route("/api/participants/:id/reset", post(reset))
}
