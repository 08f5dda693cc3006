use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::json;

use crate::{
    controllers::api_error::{ApiError, ApiResult},
    errors::StoreError,
    models::{Decision, DecisionStatus},
    services::{decisions_service, drift_engine::EvaluationSummary},
    AppState,
};

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> ApiResult<DecisionStatus> {
    raw.trim()
        .parse::<DecisionStatus>()
        .map_err(|_| ApiError::BadRequest("invalid_status"))
}

// POST /api/decisions/run
pub async fn run_decisions(State(state): State<AppState>) -> ApiResult<Json<EvaluationSummary>> {
    let summary = decisions_service::run_drift_evaluation(&state).await?;
    Ok(Json(summary))
}

// GET /api/decisions?status=open
pub async fn list_decisions(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Decision>>> {
    let status = match q.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(parse_status(s)?),
    };

    Ok(Json(decisions_service::list_decisions(&state, status).await?))
}

// POST /api/decisions/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    if ObjectId::parse_str(&id).is_err() {
        return Err(ApiError::BadRequest("bad_id"));
    }
    let Json(body) = body?;
    let status = parse_status(body.status.as_deref().unwrap_or_default())?;

    let updated = match decisions_service::update_decision_status(&state, &id, status).await {
        Ok(n) => n,
        // reopening while another open decision holds the same subject
        Err(StoreError::Conflict(_)) => return Err(ApiError::Conflict("decision_conflict")),
        Err(e) => return Err(e.into()),
    };
    if updated == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({ "updated": updated })))
}
