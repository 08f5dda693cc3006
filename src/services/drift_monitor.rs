use tokio::time;

use crate::AppState;

use super::{decisions_service, prices_service};

/// Periodically refreshes prices and re-runs the drift engine. Does nothing
/// when the configured interval is zero.
pub fn spawn_drift_monitor(state: AppState) -> Option<tokio::task::JoinHandle<()>> {
    let every = state.settings.drift_eval_interval;
    if every.is_zero() {
        return None;
    }

    tracing::info!(interval_secs = every.as_secs(), "drift monitor enabled");

    Some(tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if let Err(e) = run_tick(&state).await {
                tracing::error!(error = %e, "drift monitor tick failed");
            }
        }
    }))
}

async fn run_tick(state: &AppState) -> Result<(), crate::errors::StoreError> {
    let refresh = prices_service::refresh_prices(state).await?;
    let summary = decisions_service::run_drift_evaluation(state).await?;

    tracing::debug!(
        refreshed = refresh.refreshed,
        created = summary.created,
        evaluated = summary.evaluated,
        "drift monitor tick"
    );
    Ok(())
}
