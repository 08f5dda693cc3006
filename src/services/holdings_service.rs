use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::errors::{StoreError, SymbolCheckError};
use crate::models::{Holding, HoldingInput};
use crate::AppState;

pub type FieldErrors = BTreeMap<String, String>;

const MAX_SYMBOL_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 120;

static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9.\-]*$").expect("symbol regex compiles")
});

/// Unvalidated holding body as sent by clients.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRequest {
    pub symbol: Option<String>,
    #[serde(alias = "name")]
    pub label: Option<String>,
    pub shares: Option<f64>,
    pub target_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    // symbol was already held; shares were added to it
    Merged(String),
}

#[derive(Error, Debug)]
pub enum HoldingError {
    #[error(transparent)]
    Symbol(#[from] SymbolCheckError),

    #[error("symbol_already_exists")]
    AlreadyExists,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn validate_input(req: HoldingRequest) -> Result<HoldingInput, FieldErrors> {
    let mut errs = FieldErrors::new();

    let symbol = req.symbol.unwrap_or_default().trim().to_uppercase();
    if symbol.is_empty() {
        errs.insert("symbol".into(), "Symbol is required.".into());
    } else if symbol.len() > MAX_SYMBOL_LEN {
        errs.insert("symbol".into(), format!("Symbol must be at most {MAX_SYMBOL_LEN} characters."));
    } else if !SYMBOL_RE.is_match(&symbol) {
        errs.insert("symbol".into(), "Symbol may only contain letters, digits, '.' and '-'.".into());
    }

    let label = req
        .label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    if label.as_ref().is_some_and(|l| l.chars().count() > MAX_LABEL_LEN) {
        errs.insert("label".into(), format!("Label must be at most {MAX_LABEL_LEN} characters."));
    }

    let shares = req.shares.unwrap_or(f64::NAN);
    if !shares.is_finite() || shares <= 0.0 {
        errs.insert("shares".into(), "Enter a positive number of shares.".into());
    }

    let target_weight = req.target_weight.unwrap_or(f64::NAN);
    if !target_weight.is_finite() || !(0.0..=1.0).contains(&target_weight) {
        errs.insert("targetWeight".into(), "Target weight must be between 0 and 1.".into());
    }

    if !errs.is_empty() {
        return Err(errs);
    }

    Ok(HoldingInput {
        symbol,
        label,
        shares,
        target_weight,
    })
}

pub async fn list_holdings(state: &AppState) -> Result<Vec<Holding>, StoreError> {
    state.repos.holdings.list().await
}

/// Adds a holding. A symbol that is already held is merged: its shares grow
/// by `input.shares` and its target weight is replaced.
pub async fn create_holding(state: &AppState, input: HoldingInput) -> Result<CreateOutcome, HoldingError> {
    state.allow_list.check(&input.symbol).await?;

    let label = match &input.label {
        Some(l) => Some(l.clone()),
        None => state.allow_list.label(&input.symbol).await,
    };
    let to_insert = HoldingInput { label, ..input.clone() };

    let outcome = match state.repos.holdings.create(&to_insert).await {
        Ok(id) => CreateOutcome::Created(id),
        Err(StoreError::Conflict(_)) => {
            let changes = state
                .repos
                .holdings
                .increment(
                    &input.symbol,
                    input.shares,
                    input.target_weight,
                    input.label.as_deref(),
                )
                .await?;
            if changes == 0 {
                return Err(HoldingError::AlreadyExists);
            }

            let existing = state.repos.holdings.find_by_symbol(&input.symbol).await?;
            let Some(existing) = existing else {
                return Err(HoldingError::AlreadyExists);
            };
            tracing::info!(symbol = %input.symbol, added = input.shares, "merged into existing holding");
            CreateOutcome::Merged(existing.id)
        }
        Err(e) => return Err(e.into()),
    };

    let _ = state.events_tx.send("holdingsUpdated".to_string());
    Ok(outcome)
}

pub async fn update_holding(state: &AppState, id: &str, input: HoldingInput) -> Result<u64, HoldingError> {
    let updated = match state.repos.holdings.update(id, &input).await {
        Ok(n) => n,
        Err(StoreError::Conflict(_)) => return Err(HoldingError::AlreadyExists),
        Err(e) => return Err(e.into()),
    };

    if updated > 0 {
        let _ = state.events_tx.send("holdingsUpdated".to_string());
    }
    Ok(updated)
}

pub async fn delete_holding(state: &AppState, id: &str) -> Result<u64, StoreError> {
    let deleted = state.repos.holdings.delete(id).await?;
    if deleted > 0 {
        let _ = state.events_tx.send("holdingsUpdated".to_string());
    }
    Ok(deleted)
}
