use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const PORTFOLIO_DRIFT: &str = "portfolio.drift";

/// Review state of a decision. The only field that changes after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Open,
    Ack,
    Snoozed,
    Dismissed,
    Done,
}

impl DecisionStatus {
    pub const ALL: [DecisionStatus; 5] = [
        DecisionStatus::Open,
        DecisionStatus::Ack,
        DecisionStatus::Snoozed,
        DecisionStatus::Dismissed,
        DecisionStatus::Done,
    ];

    pub const OPEN_STATES: [DecisionStatus; 3] =
        [DecisionStatus::Open, DecisionStatus::Ack, DecisionStatus::Snoozed];

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Open => "open",
            DecisionStatus::Ack => "ack",
            DecisionStatus::Snoozed => "snoozed",
            DecisionStatus::Dismissed => "dismissed",
            DecisionStatus::Done => "done",
        }
    }

    /// Still awaiting resolution. Open-state decisions suppress duplicates.
    pub fn is_open_state(self) -> bool {
        Self::OPEN_STATES.contains(&self)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecisionStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| format!("unknown decision status: {s}"))
    }
}

/// Point-in-time values a drift decision was computed from. Enough to audit
/// the decision without re-reading holdings or prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSnapshot {
    pub symbol: String,
    pub target_weight: f64,
    pub current_weight: f64,
    // current - target
    pub delta: f64,
    pub shares: f64,
    pub last_close: f64,
    pub last_close_date: NaiveDate,
    pub market_value: f64,
    pub portfolio_value: f64,
}

/// Decision body, tagged by decision type.
///
/// New decision kinds are added as variants here; storage and the HTTP layer
/// only see `decisionType` plus an opaque `payload` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decisionType", content = "payload")]
pub enum DecisionPayload {
    #[serde(rename = "portfolio.drift")]
    PortfolioDrift(DriftSnapshot),
}

impl DecisionPayload {
    pub fn decision_type(&self) -> &'static str {
        match self {
            DecisionPayload::PortfolioDrift(_) => PORTFOLIO_DRIFT,
        }
    }

    /// Identity of the thing the decision is about. At most one open-state
    /// decision may hold a given key.
    pub fn dedupe_key(&self) -> String {
        match self {
            DecisionPayload::PortfolioDrift(s) => {
                drift_dedupe_key(&s.symbol, s.last_close_date)
            }
        }
    }
}

pub fn drift_dedupe_key(symbol: &str, last_close_date: NaiveDate) -> String {
    format!("{PORTFOLIO_DRIFT}|{}|{}", symbol.to_uppercase(), last_close_date)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub status: DecisionStatus,
    pub rationale: String,

    #[serde(flatten)]
    pub payload: DecisionPayload,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDecision {
    pub status: DecisionStatus,
    pub rationale: String,
    pub payload: DecisionPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(String),
    // another open-state decision already holds the dedupe key
    Duplicate,
}
