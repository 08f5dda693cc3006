use axum::{Router, routing::get};
use crate::{AppState, controllers::settings_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router.route(
        "/api/settings/drift-threshold",
        get(settings_controller::get_drift_threshold).put(settings_controller::put_drift_threshold),
    )
}
