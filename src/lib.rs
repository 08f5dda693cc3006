//! Library entrypoint for Portfolio Sentinel.
//!
//! The binary in `main.rs` only wires configuration and storage together;
//! everything else lives here so integration tests under `tests/` can build
//! the same router against the in-memory backend.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod models;
pub mod repositories;

pub mod services;

#[path = "views/render.rs"]
pub mod render;
#[path = "views/templates.rs"]
pub mod templates;

pub mod controllers;
pub mod routes;

use repositories::Repositories;
use services::{drift_engine::DriftEngine, stooq::PriceFeed, symbol_directory::SymbolAllowList};

#[derive(Clone)]
pub struct AppState {
    pub hbs: templates::Hbs,
    pub settings: config::Settings,
    pub repos: Repositories,
    pub price_feed: Arc<dyn PriceFeed>,
    pub allow_list: Arc<SymbolAllowList>,
    pub drift: Arc<DriftEngine>,
    pub events_tx: tokio::sync::broadcast::Sender<String>,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        repos: Repositories,
        price_feed: Arc<dyn PriceFeed>,
        allow_list: Arc<SymbolAllowList>,
    ) -> Result<Self, handlebars::TemplateError> {
        let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<String>(64);

        Ok(Self {
            hbs: templates::build_handlebars()?,
            drift: Arc::new(DriftEngine::new(&repos)),
            settings,
            repos,
            price_feed,
            allow_list,
            events_tx,
        })
    }
}
