use serde_json::{json, Value};

use crate::errors::StoreResult;
use crate::repositories::SettingsRepository;

pub const DRIFT_THRESHOLD_KEY: &str = "drift_threshold";
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.05;

/// Reads `{"pct": x}` out of a stored setting. Numbers and numeric strings
/// are accepted; anything non-finite or outside [0, 1] is rejected.
pub fn parse_drift_threshold(value_json: &str) -> Option<f64> {
    let parsed: Value = serde_json::from_str(value_json).ok()?;
    let pct = match parsed.get("pct")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    (pct.is_finite() && (0.0..=1.0).contains(&pct)).then_some(pct)
}

/// Effective drift threshold. Missing or malformed settings fall back to
/// [`DEFAULT_DRIFT_THRESHOLD`]; only storage failures are errors.
pub async fn drift_threshold(settings: &dyn SettingsRepository) -> StoreResult<f64> {
    let Some(row) = settings.get(DRIFT_THRESHOLD_KEY).await? else {
        return Ok(DEFAULT_DRIFT_THRESHOLD);
    };

    match parse_drift_threshold(&row.value_json) {
        Some(pct) => Ok(pct),
        None => {
            tracing::warn!(
                value = %row.value_json,
                "ignoring malformed drift_threshold setting, using default"
            );
            Ok(DEFAULT_DRIFT_THRESHOLD)
        }
    }
}

/// Caller must have validated `pct`.
pub async fn set_drift_threshold(settings: &dyn SettingsRepository, pct: f64) -> StoreResult<()> {
    settings
        .put(DRIFT_THRESHOLD_KEY, &json!({ "pct": pct }).to_string())
        .await
}

/// Seeds defaults without overwriting values an operator already set.
pub async fn seed_defaults(settings: &dyn SettingsRepository) -> StoreResult<()> {
    let seeded = settings
        .put_if_absent(
            DRIFT_THRESHOLD_KEY,
            &json!({ "pct": DEFAULT_DRIFT_THRESHOLD }).to_string(),
        )
        .await?;

    if seeded {
        tracing::info!(pct = DEFAULT_DRIFT_THRESHOLD, "seeded default drift threshold");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numbers_and_numeric_strings_in_range() {
        assert_eq!(parse_drift_threshold(r#"{"pct":0.1}"#), Some(0.1));
        assert_eq!(parse_drift_threshold(r#"{"pct":"0.2"}"#), Some(0.2));
        assert_eq!(parse_drift_threshold(r#"{"pct":0}"#), Some(0.0));
        assert_eq!(parse_drift_threshold(r#"{"pct":1}"#), Some(1.0));
    }

    #[test]
    fn rejects_malformed_or_out_of_range_values() {
        assert_eq!(parse_drift_threshold("not json"), None);
        assert_eq!(parse_drift_threshold(r#"{"pct":1.5}"#), None);
        assert_eq!(parse_drift_threshold(r#"{"pct":-0.01}"#), None);
        assert_eq!(parse_drift_threshold(r#"{"pct":null}"#), None);
        assert_eq!(parse_drift_threshold(r#"{"pct":"abc"}"#), None);
        assert_eq!(parse_drift_threshold(r#"{"other":0.1}"#), None);
        assert_eq!(parse_drift_threshold("[0.1]"), None);
    }
}
