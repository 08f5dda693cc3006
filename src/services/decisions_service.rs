use crate::errors::StoreError;
use crate::models::{Decision, DecisionStatus};
use crate::AppState;

use super::drift_engine::EvaluationSummary;

pub const LIST_LIMIT: usize = 200;

pub async fn run_drift_evaluation(state: &AppState) -> Result<EvaluationSummary, StoreError> {
    let summary = state.drift.evaluate().await?;

    if summary.created > 0 {
        let _ = state.events_tx.send("decisionsUpdated".to_string());
    }
    Ok(summary)
}

pub async fn list_decisions(
    state: &AppState,
    status: Option<DecisionStatus>,
) -> Result<Vec<Decision>, StoreError> {
    state.repos.decisions.list(status, LIST_LIMIT).await
}

/// Open-state decisions only, newest first. Each open status is queried on
/// its own so a long tail of terminal decisions cannot push them out.
pub async fn list_pending_decisions(state: &AppState) -> Result<Vec<Decision>, StoreError> {
    let mut pending = Vec::new();
    for status in DecisionStatus::OPEN_STATES {
        pending.extend(state.repos.decisions.list(Some(status), LIST_LIMIT).await?);
    }

    pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    pending.truncate(LIST_LIMIT);
    Ok(pending)
}

pub async fn update_decision_status(
    state: &AppState,
    id: &str,
    status: DecisionStatus,
) -> Result<u64, StoreError> {
    let updated = state.repos.decisions.update_status(id, status).await?;

    if updated > 0 {
        tracing::info!(%id, %status, "decision status changed");
        let _ = state.events_tx.send("decisionsUpdated".to_string());
    }
    Ok(updated)
}
