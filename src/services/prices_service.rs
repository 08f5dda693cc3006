use std::collections::BTreeSet;

use chrono::NaiveDate;
use futures_util::StreamExt;
use serde::Serialize;

use crate::errors::StoreError;
use crate::models::LatestPrice;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRefresh {
    pub symbol: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub results: Vec<SymbolRefresh>,
}

async fn refresh_symbol(state: &AppState, symbol: String) -> SymbolRefresh {
    let fetched = match state.price_feed.latest_daily_close(&symbol).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "price fetch failed");
            return SymbolRefresh {
                symbol,
                ok: false,
                date: None,
                close: None,
                error: Some(e.to_string()),
            };
        }
    };

    if let Err(e) = state
        .repos
        .prices
        .upsert(&symbol, &fetched, state.price_feed.source())
        .await
    {
        tracing::warn!(%symbol, error = %e, "price upsert failed");
        return SymbolRefresh {
            symbol,
            ok: false,
            date: None,
            close: None,
            error: Some(e.to_string()),
        };
    }

    SymbolRefresh {
        symbol,
        ok: true,
        date: Some(fetched.date),
        close: Some(fetched.close),
        error: None,
    }
}

/// Fetches the latest close for every held symbol and stores it.
///
/// Failures are per symbol and reported in the results; only failing to
/// read the holdings aborts the batch. Results are in symbol order.
pub async fn refresh_prices(state: &AppState) -> Result<RefreshSummary, StoreError> {
    let holdings = state.repos.holdings.list().await?;
    let symbols: BTreeSet<String> = holdings.iter().map(|h| h.symbol.to_uppercase()).collect();

    let results: Vec<SymbolRefresh> = futures_util::stream::iter(symbols)
        .map(|symbol| refresh_symbol(state, symbol))
        .buffered(state.settings.price_fetch_concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| !r.ok).count();
    tracing::info!(refreshed = results.len(), failed, "price refresh finished");

    if results.iter().any(|r| r.ok) {
        let _ = state.events_tx.send("pricesUpdated".to_string());
    }

    Ok(RefreshSummary {
        refreshed: results.len(),
        results,
    })
}

pub async fn latest_prices(state: &AppState) -> Result<Vec<LatestPrice>, StoreError> {
    state.repos.prices.latest_per_symbol().await
}
