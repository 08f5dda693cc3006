use axum::{extract::State, Json};

use crate::{
    controllers::api_error::ApiResult,
    models::LatestPrice,
    services::prices_service::{self, RefreshSummary},
    AppState,
};

// POST /api/prices/refresh
pub async fn refresh_prices(State(state): State<AppState>) -> ApiResult<Json<RefreshSummary>> {
    let summary = prices_service::refresh_prices(&state).await?;
    Ok(Json(summary))
}

// GET /api/prices/latest
pub async fn latest_prices(State(state): State<AppState>) -> ApiResult<Json<Vec<LatestPrice>>> {
    Ok(Json(prices_service::latest_prices(&state).await?))
}
