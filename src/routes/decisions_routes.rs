use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::decisions_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/decisions", get(decisions_controller::list_decisions))
        .route("/api/decisions/run", post(decisions_controller::run_decisions))
        .route("/api/decisions/:id/status", post(decisions_controller::update_status))
}
