use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::{
    controllers::api_error::{ApiError, ApiResult},
    services::holdings_service::{self, CreateOutcome, HoldingRequest},
    AppState,
};

fn parse_id(id: &str) -> ApiResult<()> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest("bad_id"))
}

// GET /api/holdings
pub async fn list_holdings(State(state): State<AppState>) -> ApiResult<Response> {
    let holdings = holdings_service::list_holdings(&state).await?;
    Ok(Json(holdings).into_response())
}

// POST /api/holdings
pub async fn create_holding(
    State(state): State<AppState>,
    body: Result<Json<HoldingRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = body?;
    let input = holdings_service::validate_input(req).map_err(ApiError::Invalid)?;

    let res = match holdings_service::create_holding(&state, input).await? {
        CreateOutcome::Created(id) => (StatusCode::CREATED, Json(json!({ "id": id }))),
        CreateOutcome::Merged(id) => (StatusCode::OK, Json(json!({ "id": id, "merged": true }))),
    };
    Ok(res.into_response())
}

// PUT /api/holdings/:id
pub async fn update_holding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<HoldingRequest>, JsonRejection>,
) -> ApiResult<Response> {
    parse_id(&id)?;
    let Json(req) = body?;
    let input = holdings_service::validate_input(req).map_err(ApiError::Invalid)?;

    let updated = holdings_service::update_holding(&state, &id, input).await?;
    if updated == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "updated": updated })).into_response())
}

// DELETE /api/holdings/:id
pub async fn delete_holding(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    parse_id(&id)?;

    let deleted = holdings_service::delete_holding(&state, &id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "deleted": deleted })).into_response())
}
