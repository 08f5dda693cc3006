use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    // raw JSON text, interpreted by whoever owns the key
    pub value_json: String,
    pub updated_at: DateTime<Utc>,
}
