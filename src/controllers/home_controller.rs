use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    controllers::api_error::ApiError,
    render,
    services::{decisions_service, holdings_service, prices_service, settings_service},
    AppState,
};

fn fmt_pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

async fn dashboard_context(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let holdings = holdings_service::list_holdings(state).await?;
    let prices = prices_service::latest_prices(state).await?;
    let pending = decisions_service::list_pending_decisions(state).await?;
    let threshold = settings_service::drift_threshold(state.repos.settings.as_ref()).await?;

    let holding_rows: Vec<_> = holdings
        .iter()
        .map(|h| {
            let price = prices.iter().find(|p| p.symbol.eq_ignore_ascii_case(&h.symbol));
            json!({
                "symbol": h.symbol,
                "label": h.label.as_deref().unwrap_or(""),
                "shares": h.shares,
                "target": fmt_pct(h.target_weight),
                "close": price.map(|p| format!("{:.2}", p.close)),
                "close_date": price.map(|p| p.date.to_string()),
            })
        })
        .collect();

    let decision_rows: Vec<_> = pending
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "status": d.status.as_str(),
                "rationale": d.rationale,
                "created_at": d.created_at.format("%Y-%m-%d %H:%M").to_string(),
            })
        })
        .collect();

    Ok(json!({
        "threshold": fmt_pct(threshold),
        "holdings": holding_rows,
        "has_holdings": !holding_rows.is_empty(),
        "decisions": decision_rows,
        "has_decisions": !decision_rows.is_empty(),
    }))
}

// GET /
pub async fn home(State(state): State<AppState>) -> Response {
    let ctx = match dashboard_context(&state).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    let body = match state.hbs.render("pages/dashboard", &ctx) {
        Ok(b) => b,
        Err(e) => return ApiError::Internal(e.to_string()).into_response(),
    };

    match render::render_full(&state, "Portfolio Sentinel", body) {
        Ok(page) => (StatusCode::OK, Html(page)).into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        return ApiError::NotFound.into_response();
    }

    let body = state
        .hbs
        .render("pages/not_found", &json!({ "path": uri.path() }))
        .unwrap_or_else(|e| format!("template error: {e}"));

    match render::render_full(&state, "404", body) {
        Ok(page) => (StatusCode::NOT_FOUND, Html(page)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Html(e)).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

pub async fn health_db(State(state): State<AppState>) -> Response {
    let backend = state.repos.health.backend();

    match state.repos.health.ping().await {
        Ok(()) => Json(json!({ "ok": true, "backend": backend })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "backend": backend, "error": e.to_string() })),
        )
            .into_response(),
    }
}
