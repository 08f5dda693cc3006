use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::json;

use crate::{
    controllers::api_error::{ApiError, ApiResult},
    services::settings_service,
    AppState,
};

// GET /api/settings/drift-threshold
pub async fn get_drift_threshold(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let pct = settings_service::drift_threshold(state.repos.settings.as_ref()).await?;
    Ok(Json(json!({ "pct": pct })))
}

// PUT /api/settings/drift-threshold
pub async fn put_drift_threshold(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(body) = body?;

    // same rules as the stored value: a number or numeric string in [0, 1]
    let pct = settings_service::parse_drift_threshold(&body.to_string())
        .ok_or(ApiError::BadRequest("invalid_pct"))?;

    settings_service::set_drift_threshold(state.repos.settings.as_ref(), pct).await?;
    tracing::info!(pct, "drift threshold updated");

    Ok(Json(json!({ "pct": pct })))
}
