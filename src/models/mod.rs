pub mod holding;
pub mod price;
pub mod decision;
pub mod setting;

pub use holding::{Holding, HoldingInput};
pub use price::{DailyClose, LatestPrice, PricePoint};
pub use decision::{
    Decision, DecisionPayload, DecisionStatus, DriftSnapshot, InsertOutcome, NewDecision,
    PORTFOLIO_DRIFT,
};
pub use setting::Setting;
