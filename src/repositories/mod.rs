//! Storage contracts for the four stores the drift workflow reads and writes.
//!
//! Two backends implement every trait: [`mongo::MongoStore`] for deployments
//! and [`memory::MemoryStore`] for tests and throwaway local runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::StoreResult;
use crate::models::{
    DailyClose, Decision, DecisionStatus, Holding, HoldingInput, InsertOutcome, LatestPrice,
    NewDecision, Setting,
};

pub mod memory;
pub mod mongo;

#[async_trait]
pub trait HoldingsRepository: Send + Sync {
    /// All holdings ordered by symbol ascending.
    async fn list(&self) -> StoreResult<Vec<Holding>>;

    async fn find_by_symbol(&self, symbol: &str) -> StoreResult<Option<Holding>>;

    /// Inserts a holding and returns its id. Fails with
    /// [`StoreError::Conflict`](crate::errors::StoreError::Conflict) when the
    /// symbol is already held.
    async fn create(&self, input: &HoldingInput) -> StoreResult<String>;

    /// Adds `shares_to_add` to an existing holding and overwrites its target
    /// weight. The label is only replaced when one is given. Returns the
    /// number of matched holdings.
    async fn increment(
        &self,
        symbol: &str,
        shares_to_add: f64,
        target_weight: f64,
        label: Option<&str>,
    ) -> StoreResult<u64>;

    async fn update(&self, id: &str, input: &HoldingInput) -> StoreResult<u64>;

    async fn delete(&self, id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// One row per symbol: the close with the greatest date.
    async fn latest_per_symbol(&self) -> StoreResult<Vec<LatestPrice>>;

    /// Inserts or overwrites the close for `(symbol, close.date)`.
    async fn upsert(&self, symbol: &str, close: &DailyClose, source: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Setting>>;

    async fn put(&self, key: &str, value_json: &str) -> StoreResult<()>;

    /// Stores the value only when the key is missing. Returns true if written.
    async fn put_if_absent(&self, key: &str, value_json: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait DecisionRepository: Send + Sync {
    /// Open-state (`open|ack|snoozed`) decisions of `decision_type` about
    /// `symbol` at `last_close_date`.
    async fn count_open(
        &self,
        decision_type: &str,
        symbol: &str,
        last_close_date: NaiveDate,
    ) -> StoreResult<u64>;

    /// Inserts atomically with respect to the open-state uniqueness rule:
    /// an open-state decision whose dedupe key is already held by another
    /// open-state decision is not written and yields
    /// [`InsertOutcome::Duplicate`].
    async fn insert(&self, decision: &NewDecision) -> StoreResult<InsertOutcome>;

    /// Newest first.
    async fn list(&self, status: Option<DecisionStatus>, limit: usize) -> StoreResult<Vec<Decision>>;

    /// Returns the number of decisions changed. Re-opening a decision whose
    /// key is held by another open-state decision fails with a conflict.
    async fn update_status(&self, id: &str, status: DecisionStatus) -> StoreResult<u64>;
}

#[async_trait]
pub trait StorageHealth: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct Repositories {
    pub holdings: Arc<dyn HoldingsRepository>,
    pub prices: Arc<dyn PriceRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub health: Arc<dyn StorageHealth>,
}

impl Repositories {
    pub fn memory() -> Self {
        Self::from_store(Arc::new(memory::MemoryStore::default()))
    }

    pub fn mongo(db: mongodb::Database) -> Self {
        Self::from_store(Arc::new(mongo::MongoStore::new(db)))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: HoldingsRepository
            + PriceRepository
            + SettingsRepository
            + DecisionRepository
            + StorageHealth
            + 'static,
    {
        Self {
            holdings: store.clone(),
            prices: store.clone(),
            settings: store.clone(),
            decisions: store.clone(),
            health: store,
        }
    }
}
