use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{AppState, controllers::home_controller};

pub mod home_routes;
pub mod holdings_routes;
pub mod prices_routes;
pub mod decisions_routes;
pub mod settings_routes;
pub mod realtime_routes;

pub fn app(state: AppState) -> Router {
    let router = Router::<AppState>::new();

    let router = home_routes::add_routes(router);
    let router = holdings_routes::add_routes(router);
    let router = prices_routes::add_routes(router);
    let router = decisions_routes::add_routes(router);
    let router = settings_routes::add_routes(router);
    let router = realtime_routes::add_routes(router);

    router
        .fallback(home_controller::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
