use axum::{Router, routing::get};
use crate::{AppState, controllers::home_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/", get(home_controller::home))
        .route("/api/health", get(home_controller::health))
        .route("/api/health/db", get(home_controller::health_db))
}
