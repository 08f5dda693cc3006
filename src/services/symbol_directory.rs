//! Exchange symbol directory used to decide which symbols may be held.
//!
//! Lifecycle of the cached directory:
//! - nothing is fetched until the first lookup;
//! - a fetched directory is served for `ttl`, after which the next lookup
//!   refreshes it;
//! - lookups that arrive while a refresh is running wait on that refresh
//!   instead of starting their own;
//! - a failed refresh is not cached, so the next lookup after it retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;

use crate::errors::{SymbolCheckError, SymbolSourceError};

/// Uppercased symbol -> security name (may be empty).
pub type SymbolMap = HashMap<String, String>;

pub const NASDAQ_SYMBOL_LIST_URLS: [&str; 2] = [
    "https://www.nasdaqtrader.com/dynamic/SymDir/nasdaqlisted.txt",
    "https://www.nasdaqtrader.com/dynamic/SymDir/otherlisted.txt",
];

#[async_trait]
pub trait SymbolSource: Send + Sync {
    async fn fetch(&self) -> Result<SymbolMap, SymbolSourceError>;
}

pub struct NasdaqSymbolSource {
    http: Client,
    urls: Vec<String>,
}

impl NasdaqSymbolSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("portfolio-sentinel/0.1")
            .build()?;

        Ok(Self {
            http,
            urls: NASDAQ_SYMBOL_LIST_URLS.iter().map(|u| u.to_string()).collect(),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, SymbolSourceError> {
        let res = self.http.get(url).send().await?;
        if !res.status().is_success() {
            return Err(SymbolSourceError::Http(res.status().as_u16()));
        }
        Ok(res.text().await?)
    }
}

#[async_trait]
impl SymbolSource for NasdaqSymbolSource {
    async fn fetch(&self) -> Result<SymbolMap, SymbolSourceError> {
        let texts =
            futures_util::future::try_join_all(self.urls.iter().map(|u| self.fetch_text(u))).await?;

        let mut merged = SymbolMap::new();
        for text in texts {
            for (symbol, name) in parse_symbol_directory(&text) {
                let keep_existing = merged.get(&symbol).is_some_and(|n| !n.is_empty());
                if !keep_existing {
                    merged.insert(symbol, name);
                }
            }
        }

        tracing::info!(symbols = merged.len(), "fetched symbol directory");
        Ok(merged)
    }
}

/// Parses a pipe-delimited Nasdaq Trader directory file, keeping ETFs that
/// are not test issues.
///
/// `nasdaqlisted.txt` names its symbol column `Symbol`; `otherlisted.txt`
/// uses `ACT Symbol`. Files without an `ETF` column yield nothing.
pub fn parse_symbol_directory(text: &str) -> SymbolMap {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let Ok(headers) = rdr.headers() else {
        return SymbolMap::new();
    };
    let header: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    let find = |name: &str| header.iter().position(|h| h == name);

    let Some(symbol_idx) = find("symbol").or_else(|| find("act symbol")) else {
        return SymbolMap::new();
    };
    let Some(etf_idx) = find("etf") else {
        return SymbolMap::new();
    };
    let test_idx = find("test issue");
    let name_idx = find("security name");

    let mut symbols = SymbolMap::new();
    for rec in rdr.records().flatten() {
        if rec.get(0).is_some_and(|f| f.starts_with("File Creation Time")) {
            continue;
        }
        if test_idx.and_then(|i| rec.get(i)) == Some("Y") {
            continue;
        }
        if rec.get(etf_idx) != Some("Y") {
            continue;
        }
        let symbol = rec.get(symbol_idx).unwrap_or("");
        if symbol.is_empty() {
            continue;
        }
        let name = name_idx.and_then(|i| rec.get(i)).unwrap_or("");
        symbols.insert(symbol.to_uppercase(), name.to_string());
    }
    symbols
}

type Refresh = Shared<BoxFuture<'static, Result<Arc<SymbolMap>, String>>>;

#[derive(Default)]
struct CacheState {
    fetched: Option<(Instant, Arc<SymbolMap>)>,
    in_flight: Option<Refresh>,
}

/// TTL cache over a [`SymbolSource`] that runs at most one fetch at a time.
pub struct SymbolCache {
    source: Arc<dyn SymbolSource>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SymbolCache {
    pub fn new(source: Arc<dyn SymbolSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn symbols(&self) -> Result<Arc<SymbolMap>, String> {
        let refresh = {
            let mut st = self.state.lock().map_err(|_| "symbol cache poisoned".to_string())?;

            if let Some((at, map)) = &st.fetched {
                if at.elapsed() < self.ttl {
                    return Ok(map.clone());
                }
            }

            match st.in_flight.clone() {
                Some(running) => running,
                None => {
                    let source = self.source.clone();
                    let refresh = async move {
                        source
                            .fetch()
                            .await
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    }
                    .boxed()
                    .shared();
                    st.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        let mut st = self.state.lock().map_err(|_| "symbol cache poisoned".to_string())?;
        if st.in_flight.as_ref().is_some_and(|f| f.ptr_eq(&refresh)) {
            st.in_flight = None;
            if let Ok(map) = &result {
                st.fetched = Some((Instant::now(), map.clone()));
            }
        }
        result
    }
}

/// Decides whether a symbol may be added to the portfolio.
pub struct SymbolAllowList {
    // None disables checking
    cache: Option<Arc<SymbolCache>>,
}

impl SymbolAllowList {
    pub fn new(cache: Arc<SymbolCache>) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn disabled() -> Self {
        Self { cache: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub async fn check(&self, symbol: &str) -> Result<(), SymbolCheckError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let symbols = cache.symbols().await.map_err(|e| {
            tracing::warn!(error = %e, "symbol directory unavailable");
            SymbolCheckError::Unavailable(e)
        })?;

        if symbols.contains_key(&symbol.to_uppercase()) {
            Ok(())
        } else {
            Err(SymbolCheckError::NotAllowed)
        }
    }

    /// Security name for a symbol, if the directory knows one.
    pub async fn label(&self, symbol: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let symbols = cache.symbols().await.ok()?;
        symbols
            .get(&symbol.to_uppercase())
            .filter(|name| !name.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NASDAQ_LISTED: &str = "\
Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
QQQ|Invesco QQQ Trust, Series 1|G|N|N|100|Y|N
AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N
ZXZZT|NASDAQ TEST STOCK|G|Y|N|100|Y|N
File Creation Time: 0607202421:31||||||
";

    const OTHER_LISTED: &str = "\
ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
VTI|Vanguard Total Stock Market ETF|P|VTI|Y|100|N|VTI
spy|SPDR S&P 500 ETF Trust|P|SPY|Y|100|N|SPY
IBM|International Business Machines|N|IBM|N|100|N|IBM
";

    #[test]
    fn keeps_only_non_test_etfs() {
        let map = parse_symbol_directory(NASDAQ_LISTED);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("QQQ").map(String::as_str), Some("Invesco QQQ Trust, Series 1"));
    }

    #[test]
    fn reads_act_symbol_column_and_uppercases() {
        let map = parse_symbol_directory(OTHER_LISTED);
        assert!(map.contains_key("VTI"));
        assert!(map.contains_key("SPY"));
        assert!(!map.contains_key("IBM"));
    }

    #[test]
    fn files_without_etf_column_yield_nothing() {
        let map = parse_symbol_directory("Symbol|Security Name\nQQQ|Invesco\n");
        assert!(map.is_empty());
    }
}
