use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,

    // always stored uppercase
    pub symbol: String,
    pub label: Option<String>,

    pub shares: f64,
    // fraction of the portfolio, 0..=1
    pub target_weight: f64,

    pub created_at: DateTime<Utc>,
}

/// A validated create/update request. Build it through
/// `holdings_service::validate_input`.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingInput {
    pub symbol: String,
    pub label: Option<String>,
    pub shares: f64,
    pub target_weight: f64,
}
