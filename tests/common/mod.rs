#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use http_body_util::BodyExt;

use portfolio_sentinel::{
    config::{self, StorageBackend},
    errors::{FeedError, SymbolSourceError},
    models::{
        DailyClose, DecisionPayload, DecisionStatus, DriftSnapshot, HoldingInput, NewDecision,
    },
    repositories::Repositories,
    services::{
        stooq::PriceFeed,
        symbol_directory::{SymbolAllowList, SymbolCache, SymbolMap, SymbolSource},
    },
    AppState,
};

/// Price feed answering from a fixed table; unknown symbols fail.
#[derive(Default)]
pub struct StubFeed {
    closes: Mutex<HashMap<String, DailyClose>>,
}

impl StubFeed {
    pub fn set(&self, symbol: &str, date: NaiveDate, close: f64) {
        self.closes
            .lock()
            .unwrap()
            .insert(symbol.to_string(), DailyClose { date, close });
    }
}

#[async_trait]
impl PriceFeed for StubFeed {
    fn source(&self) -> &'static str {
        "stub"
    }

    async fn latest_daily_close(&self, symbol: &str) -> Result<DailyClose, FeedError> {
        self.closes
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or(FeedError::Empty)
    }
}

/// Symbol directory that counts fetches and can be told to fail.
pub struct StubSymbols {
    pub map: SymbolMap,
    pub fetches: AtomicUsize,
    pub fail: std::sync::atomic::AtomicBool,
    pub delay: Duration,
}

impl StubSymbols {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(s, n)| (s.to_string(), n.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
            fail: std::sync::atomic::AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SymbolSource for StubSymbols {
    async fn fetch(&self) -> Result<SymbolMap, SymbolSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SymbolSourceError::Http(503));
        }
        Ok(self.map.clone())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub feed: Arc<StubFeed>,
    pub symbols: Arc<StubSymbols>,
}

pub fn test_settings() -> config::Settings {
    config::Settings {
        storage_backend: StorageBackend::Memory,
        ..config::Settings::default()
    }
}

/// Memory-backed state whose allow-list knows VTI, BND, AAA and BBB.
pub fn test_app() -> TestApp {
    let symbols = Arc::new(StubSymbols::new(&[
        ("VTI", "Vanguard Total Stock Market ETF"),
        ("BND", "Vanguard Total Bond Market ETF"),
        ("AAA", ""),
        ("BBB", ""),
    ]));
    test_app_with(symbols)
}

pub fn test_app_with(symbols: Arc<StubSymbols>) -> TestApp {
    let settings = test_settings();
    let feed = Arc::new(StubFeed::default());
    let cache = SymbolCache::new(symbols.clone(), settings.symbol_list_ttl);

    let state = AppState::new(
        settings,
        Repositories::memory(),
        feed.clone(),
        Arc::new(SymbolAllowList::new(Arc::new(cache))),
    )
    .expect("templates compile");

    TestApp {
        state,
        feed,
        symbols,
    }
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A drift decision for `symbol` on `date` with a fixed 0.1 overweight.
pub fn drift_decision(symbol: &str, date: &str, status: DecisionStatus) -> NewDecision {
    NewDecision {
        status,
        rationale: format!("{symbol} is overweight by 10.00% vs target."),
        payload: DecisionPayload::PortfolioDrift(DriftSnapshot {
            symbol: symbol.to_string(),
            target_weight: 0.4,
            current_weight: 0.5,
            delta: 0.1,
            shares: 10.0,
            last_close: 50.0,
            last_close_date: day(date),
            market_value: 500.0,
            portfolio_value: 1000.0,
        }),
    }
}

pub async fn add_holding(state: &AppState, symbol: &str, shares: f64, target_weight: f64) -> String {
    state
        .repos
        .holdings
        .create(&HoldingInput {
            symbol: symbol.to_string(),
            label: None,
            shares,
            target_weight,
        })
        .await
        .unwrap()
}

pub async fn add_price(state: &AppState, symbol: &str, date: &str, close: f64) {
    state
        .repos
        .prices
        .upsert(symbol, &DailyClose { date: day(date), close }, "test")
        .await
        .unwrap();
}

pub async fn response_body_string(res: axum::response::Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

pub async fn response_json(res: axum::response::Response) -> serde_json::Value {
    let body = response_body_string(res).await;
    serde_json::from_str(&body).unwrap()
}
