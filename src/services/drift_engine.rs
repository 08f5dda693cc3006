//! Portfolio drift evaluation.
//!
//! One run values every holding at its latest close, compares the resulting
//! weight with the holding's target and records a `portfolio.drift` decision
//! for each holding whose drift reaches the configured threshold.
//!
//! Runs are idempotent per price snapshot: while an open-state decision
//! exists for a `(symbol, lastCloseDate)` pair, no second one is created.
//! A new close date, or resolving the earlier decision, allows a new one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::StoreResult;
use crate::models::{
    DecisionPayload, DecisionStatus, DriftSnapshot, Holding, InsertOutcome, LatestPrice,
    NewDecision, PORTFOLIO_DRIFT,
};
use crate::repositories::{
    DecisionRepository, HoldingsRepository, PriceRepository, Repositories, SettingsRepository,
};

use super::settings_service;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub created: u32,
    // holdings that had a price
    pub evaluated: u32,
}

/// A holding joined to its latest close.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedHolding {
    pub holding: Holding,
    pub price: LatestPrice,
    pub market_value: f64,
}

/// Joins holdings to prices by uppercased symbol. Holdings without a price
/// are dropped. The result is ordered by symbol.
pub fn value_holdings(holdings: Vec<Holding>, latest: Vec<LatestPrice>) -> Vec<ValuedHolding> {
    let by_symbol: HashMap<String, LatestPrice> = latest
        .into_iter()
        .map(|p| (p.symbol.to_uppercase(), p))
        .collect();

    let mut valued: Vec<ValuedHolding> = holdings
        .into_iter()
        .filter_map(|holding| {
            let price = by_symbol.get(&holding.symbol.to_uppercase())?.clone();
            let market_value = holding.shares * price.close;
            Some(ValuedHolding {
                holding,
                price,
                market_value,
            })
        })
        .collect();

    valued.sort_by(|a, b| a.holding.symbol.cmp(&b.holding.symbol));
    valued
}

pub fn drift_rationale(symbol: &str, delta: f64) -> String {
    let direction = if delta > 0.0 { "overweight" } else { "underweight" };
    // half away from zero; `{:.2}` alone rounds exact ties to even
    let pct = (delta.abs() * 100.0 * 100.0).round() / 100.0;
    format!("{symbol} is {direction} by {pct:.2}% vs target.")
}

pub struct DriftEngine {
    holdings: Arc<dyn HoldingsRepository>,
    prices: Arc<dyn PriceRepository>,
    settings: Arc<dyn SettingsRepository>,
    decisions: Arc<dyn DecisionRepository>,
    // serialises runs within this process
    run_lock: Mutex<()>,
}

impl DriftEngine {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            holdings: repos.holdings.clone(),
            prices: repos.prices.clone(),
            settings: repos.settings.clone(),
            decisions: repos.decisions.clone(),
            run_lock: Mutex::new(()),
        }
    }

    /// Evaluates every holding once. Storage errors abort the run; decisions
    /// inserted before the failure are kept.
    pub async fn evaluate(&self) -> StoreResult<EvaluationSummary> {
        let _guard = self.run_lock.lock().await;

        let holdings = self.holdings.list().await?;
        if holdings.is_empty() {
            return Ok(EvaluationSummary::default());
        }

        let threshold = settings_service::drift_threshold(self.settings.as_ref()).await?;
        let latest = self.prices.latest_per_symbol().await?;

        let valued = value_holdings(holdings, latest);
        let evaluated = valued.len() as u32;

        let portfolio_value: f64 = valued.iter().map(|v| v.market_value).sum();
        if portfolio_value <= 0.0 {
            tracing::debug!(evaluated, "portfolio has no measurable value, skipping drift check");
            return Ok(EvaluationSummary {
                created: 0,
                evaluated,
            });
        }

        let mut created = 0;
        for v in valued {
            let current_weight = v.market_value / portfolio_value;
            let target_weight = v.holding.target_weight;
            let delta = current_weight - target_weight;
            if delta.abs() < threshold {
                continue;
            }

            let symbol = v.holding.symbol.clone();
            let already = self
                .decisions
                .count_open(PORTFOLIO_DRIFT, &symbol, v.price.date)
                .await?;
            if already > 0 {
                continue;
            }

            let decision = NewDecision {
                status: DecisionStatus::Open,
                rationale: drift_rationale(&symbol, delta),
                payload: DecisionPayload::PortfolioDrift(DriftSnapshot {
                    symbol: symbol.clone(),
                    target_weight,
                    current_weight,
                    delta,
                    shares: v.holding.shares,
                    last_close: v.price.close,
                    last_close_date: v.price.date,
                    market_value: v.market_value,
                    portfolio_value,
                }),
            };

            match self.decisions.insert(&decision).await? {
                InsertOutcome::Inserted(id) => {
                    tracing::info!(%symbol, %id, delta, "drift decision created");
                    created += 1;
                }
                // lost a race with another writer
                InsertOutcome::Duplicate => {
                    tracing::debug!(%symbol, "open drift decision already exists");
                }
            }
        }

        tracing::info!(created, evaluated, threshold, "drift evaluation finished");
        Ok(EvaluationSummary { created, evaluated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn holding(symbol: &str, shares: f64, target: f64) -> Holding {
        Holding {
            id: symbol.to_lowercase(),
            symbol: symbol.to_string(),
            label: None,
            shares,
            target_weight: target,
            created_at: Utc::now(),
        }
    }

    fn price(symbol: &str, close: f64) -> LatestPrice {
        LatestPrice {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            close,
        }
    }

    #[test]
    fn rationale_states_direction_and_two_decimal_magnitude() {
        assert_eq!(
            drift_rationale("VTI", 0.1234),
            "VTI is overweight by 12.34% vs target."
        );
        assert_eq!(
            drift_rationale("BND", -0.05),
            "BND is underweight by 5.00% vs target."
        );
    }

    #[test]
    fn rationale_rounds_exact_ties_up() {
        assert_eq!(
            drift_rationale("X", 0.12125),
            "X is overweight by 12.13% vs target."
        );
        assert_eq!(
            drift_rationale("X", -0.01125),
            "X is underweight by 1.13% vs target."
        );
        assert_eq!(
            drift_rationale("X", 0.00125),
            "X is overweight by 0.13% vs target."
        );
    }

    #[test]
    fn unpriced_holdings_are_dropped_and_symbols_match_case_insensitively() {
        let valued = value_holdings(
            vec![holding("BBB", 10.0, 0.5), holding("AAA", 2.0, 0.5), holding("CCC", 1.0, 0.0)],
            vec![price("bbb", 30.0), price("AAA", 10.0)],
        );

        let symbols: Vec<&str> = valued.iter().map(|v| v.holding.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
        assert_eq!(valued[0].market_value, 20.0);
        assert_eq!(valued[1].market_value, 300.0);
    }
}
