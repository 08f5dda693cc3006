use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    pub storage_backend: StorageBackend,
    pub mongodb_uri: String,
    pub mongodb_db: String,

    pub stooq_base_url: String,
    pub price_fetch_timeout: Duration,
    pub price_fetch_concurrency: usize,

    pub symbol_allowlist_enabled: bool,
    pub symbol_list_ttl: Duration,
    pub symbol_list_timeout: Duration,

    // zero disables the background evaluation loop
    pub drift_eval_interval: Duration,

    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            storage_backend: StorageBackend::Mongo,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "portfolio_sentinel".to_string(),
            stooq_base_url: "https://stooq.com".to_string(),
            price_fetch_timeout: Duration::from_secs(10),
            price_fetch_concurrency: 4,
            symbol_allowlist_enabled: true,
            symbol_list_ttl: Duration::from_secs(12 * 60 * 60),
            symbol_list_timeout: Duration::from_secs(15),
            drift_eval_interval: Duration::ZERO,
            log_format: LogFormat::Text,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn secs_var(key: &str, default: Duration) -> Duration {
    parse_var::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn flag_var(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let defaults = Settings::default();

    let storage_backend = match var_or("STORAGE_BACKEND", "mongo").trim().to_ascii_lowercase().as_str() {
        "memory" => StorageBackend::Memory,
        _ => StorageBackend::Mongo,
    };

    let log_format = if var_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    };

    Settings {
        host: var_or("HOST", &defaults.host),
        port: parse_var("PORT").unwrap_or(defaults.port),
        storage_backend,
        mongodb_uri: var_or("MONGODB_URI", &defaults.mongodb_uri),
        mongodb_db: var_or("MONGODB_DB", &defaults.mongodb_db),
        stooq_base_url: var_or("STOOQ_BASE_URL", &defaults.stooq_base_url),
        price_fetch_timeout: secs_var("PRICE_FETCH_TIMEOUT_SECS", defaults.price_fetch_timeout),
        price_fetch_concurrency: parse_var::<usize>("PRICE_FETCH_CONCURRENCY")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.price_fetch_concurrency),
        symbol_allowlist_enabled: flag_var("SYMBOL_ALLOWLIST_ENABLED", defaults.symbol_allowlist_enabled),
        symbol_list_ttl: secs_var("SYMBOL_LIST_TTL_SECS", defaults.symbol_list_ttl),
        symbol_list_timeout: secs_var("SYMBOL_LIST_TIMEOUT_SECS", defaults.symbol_list_timeout),
        drift_eval_interval: secs_var("DRIFT_EVAL_INTERVAL_SECS", defaults.drift_eval_interval),
        log_format,
    }
}
