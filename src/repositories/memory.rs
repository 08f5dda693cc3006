use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;

use crate::errors::{StoreError, StoreResult};
use crate::models::{
    DailyClose, Decision, DecisionPayload, DecisionStatus, Holding, HoldingInput, InsertOutcome,
    LatestPrice, NewDecision, PricePoint, Setting,
};

use super::{
    DecisionRepository, HoldingsRepository, PriceRepository, SettingsRepository, StorageHealth,
};

#[derive(Default)]
struct Tables {
    // keyed by id
    holdings: HashMap<String, Holding>,
    // keyed by (symbol, date); BTreeMap keeps each symbol's dates ordered
    prices: BTreeMap<(String, NaiveDate), PricePoint>,
    settings: HashMap<String, Setting>,
    // insertion order == creation order
    decisions: Vec<Decision>,
}

/// Process-local store. Every operation runs under one lock, so the
/// open-state uniqueness check and the insert are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn holds_open_key(d: &Decision, key: &str) -> bool {
    d.status.is_open_state() && d.payload.dedupe_key() == key
}

#[async_trait]
impl HoldingsRepository for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Holding>> {
        let t = self.lock()?;
        let mut out: Vec<Holding> = t.holdings.values().cloned().collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(out)
    }

    async fn find_by_symbol(&self, symbol: &str) -> StoreResult<Option<Holding>> {
        let sym = symbol.to_uppercase();
        let t = self.lock()?;
        Ok(t.holdings.values().find(|h| h.symbol == sym).cloned())
    }

    async fn create(&self, input: &HoldingInput) -> StoreResult<String> {
        let sym = input.symbol.to_uppercase();
        let mut t = self.lock()?;

        if t.holdings.values().any(|h| h.symbol == sym) {
            return Err(StoreError::Conflict(format!("holdings.symbol {sym}")));
        }

        let id = new_id();
        t.holdings.insert(
            id.clone(),
            Holding {
                id: id.clone(),
                symbol: sym,
                label: input.label.clone(),
                shares: input.shares,
                target_weight: input.target_weight,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn increment(
        &self,
        symbol: &str,
        shares_to_add: f64,
        target_weight: f64,
        label: Option<&str>,
    ) -> StoreResult<u64> {
        let sym = symbol.to_uppercase();
        let mut t = self.lock()?;

        let Some(h) = t.holdings.values_mut().find(|h| h.symbol == sym) else {
            return Ok(0);
        };
        h.shares += shares_to_add;
        h.target_weight = target_weight;
        if let Some(label) = label {
            h.label = Some(label.to_string());
        }
        Ok(1)
    }

    async fn update(&self, id: &str, input: &HoldingInput) -> StoreResult<u64> {
        let sym = input.symbol.to_uppercase();
        let mut t = self.lock()?;

        if !t.holdings.contains_key(id) {
            return Ok(0);
        }
        if t.holdings.values().any(|h| h.symbol == sym && h.id != id) {
            return Err(StoreError::Conflict(format!("holdings.symbol {sym}")));
        }

        if let Some(h) = t.holdings.get_mut(id) {
            h.symbol = sym;
            h.label = input.label.clone();
            h.shares = input.shares;
            h.target_weight = input.target_weight;
        }
        Ok(1)
    }

    async fn delete(&self, id: &str) -> StoreResult<u64> {
        let mut t = self.lock()?;
        Ok(t.holdings.remove(id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl PriceRepository for MemoryStore {
    async fn latest_per_symbol(&self) -> StoreResult<Vec<LatestPrice>> {
        let t = self.lock()?;

        let mut latest: BTreeMap<&str, &PricePoint> = BTreeMap::new();
        for ((symbol, _), p) in &t.prices {
            // keys iterate in date order per symbol, so the last write wins
            latest.insert(symbol.as_str(), p);
        }

        Ok(latest
            .into_values()
            .map(|p| LatestPrice {
                symbol: p.symbol.clone(),
                date: p.date,
                close: p.close,
            })
            .collect())
    }

    async fn upsert(&self, symbol: &str, close: &DailyClose, source: &str) -> StoreResult<()> {
        let sym = symbol.to_uppercase();
        let mut t = self.lock()?;
        t.prices.insert(
            (sym.clone(), close.date),
            PricePoint {
                symbol: sym,
                date: close.date,
                close: close.close,
                source: source.to_string(),
                ingested_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Setting>> {
        let t = self.lock()?;
        Ok(t.settings.get(key).cloned())
    }

    async fn put(&self, key: &str, value_json: &str) -> StoreResult<()> {
        let mut t = self.lock()?;
        t.settings.insert(
            key.to_string(),
            Setting {
                key: key.to_string(),
                value_json: value_json.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value_json: &str) -> StoreResult<bool> {
        let mut t = self.lock()?;
        if t.settings.contains_key(key) {
            return Ok(false);
        }
        t.settings.insert(
            key.to_string(),
            Setting {
                key: key.to_string(),
                value_json: value_json.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl DecisionRepository for MemoryStore {
    async fn count_open(
        &self,
        decision_type: &str,
        symbol: &str,
        last_close_date: NaiveDate,
    ) -> StoreResult<u64> {
        let sym = symbol.to_uppercase();
        let t = self.lock()?;

        let n = t
            .decisions
            .iter()
            .filter(|d| d.status.is_open_state() && d.payload.decision_type() == decision_type)
            .filter(|d| match &d.payload {
                DecisionPayload::PortfolioDrift(s) => {
                    s.symbol == sym && s.last_close_date == last_close_date
                }
            })
            .count();
        Ok(n as u64)
    }

    async fn insert(&self, decision: &NewDecision) -> StoreResult<InsertOutcome> {
        let mut t = self.lock()?;

        if decision.status.is_open_state() {
            let key = decision.payload.dedupe_key();
            if t.decisions.iter().any(|d| holds_open_key(d, &key)) {
                return Ok(InsertOutcome::Duplicate);
            }
        }

        let now = Utc::now();
        let id = new_id();
        t.decisions.push(Decision {
            id: id.clone(),
            status: decision.status,
            rationale: decision.rationale.clone(),
            payload: decision.payload.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn list(&self, status: Option<DecisionStatus>, limit: usize) -> StoreResult<Vec<Decision>> {
        let t = self.lock()?;
        Ok(t.decisions
            .iter()
            .rev()
            .filter(|d| status.is_none_or(|st| d.status == st))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: &str, status: DecisionStatus) -> StoreResult<u64> {
        let mut t = self.lock()?;

        let Some(idx) = t.decisions.iter().position(|d| d.id == id) else {
            return Ok(0);
        };

        if status.is_open_state() {
            let key = t.decisions[idx].payload.dedupe_key();
            let taken = t
                .decisions
                .iter()
                .any(|d| d.id != id && holds_open_key(d, &key));
            if taken {
                return Err(StoreError::Conflict(format!("decisions.open_key {key}")));
            }
        }

        let d = &mut t.decisions[idx];
        d.status = status;
        d.updated_at = Utc::now();
        Ok(1)
    }
}

#[async_trait]
impl StorageHealth for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}
