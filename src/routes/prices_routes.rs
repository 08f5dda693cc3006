use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::prices_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/prices/refresh", post(prices_controller::refresh_prices))
        .route("/api/prices/latest", get(prices_controller::latest_prices))
}
