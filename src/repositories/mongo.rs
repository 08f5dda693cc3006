use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, UpdateOptions};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::models::{
    DailyClose, Decision, DecisionPayload, DecisionStatus, Holding, HoldingInput, InsertOutcome,
    LatestPrice, NewDecision, Setting,
};

use super::{
    DecisionRepository, HoldingsRepository, PriceRepository, SettingsRepository, StorageHealth,
};

pub const HOLDINGS: &str = "holdings";
pub const PRICES: &str = "prices";
pub const SETTINGS: &str = "settings";
pub const DECISIONS: &str = "decisions";

const DUPLICATE_KEY: i32 = 11000;

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn millis_to_utc(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

fn parse_date(raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("bad price date {raw:?}: {e}")))
}

#[derive(Debug, Serialize, Deserialize)]
struct HoldingDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    symbol: String,
    label: Option<String>,
    shares: f64,
    target_weight: f64,
    created_at: i64,
}

impl TryFrom<HoldingDoc> for Holding {
    type Error = StoreError;

    fn try_from(d: HoldingDoc) -> StoreResult<Self> {
        Ok(Holding {
            id: d.id.to_hex(),
            symbol: d.symbol,
            label: d.label,
            shares: d.shares,
            target_weight: d.target_weight,
            created_at: millis_to_utc(d.created_at)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    decision_type: String,
    status: DecisionStatus,
    rationale: String,
    payload: Document,

    // permanent identity of the subject
    dedupe_key: String,
    // mirrors dedupe_key only while the status is open-state; unique index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    open_key: Option<String>,

    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DecisionDoc> for Decision {
    type Error = StoreError;

    fn try_from(d: DecisionDoc) -> StoreResult<Self> {
        let payload: DecisionPayload = bson::from_document(doc! {
            "decisionType": &d.decision_type,
            "payload": d.payload,
        })?;

        Ok(Decision {
            id: d.id.to_hex(),
            status: d.status,
            rationale: d.rationale,
            payload,
            created_at: millis_to_utc(d.created_at)?,
            updated_at: millis_to_utc(d.updated_at)?,
        })
    }
}

/// Splits a tagged payload into its type name and the inner document.
fn payload_body(payload: &DecisionPayload) -> StoreResult<Document> {
    let tagged = bson::to_document(payload)?;
    tagged
        .get_document("payload")
        .cloned()
        .map_err(|e| StoreError::Database(format!("payload did not serialize to a document: {e}")))
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingDoc {
    #[serde(rename = "_id")]
    key: String,
    value_json: String,
    updated_at: i64,
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn holdings(&self) -> Collection<HoldingDoc> {
        self.db.collection::<HoldingDoc>(HOLDINGS)
    }

    fn decisions(&self) -> Collection<DecisionDoc> {
        self.db.collection::<DecisionDoc>(DECISIONS)
    }

    fn settings(&self) -> Collection<SettingDoc> {
        self.db.collection::<SettingDoc>(SETTINGS)
    }

    fn prices(&self) -> Collection<Document> {
        self.db.collection::<Document>(PRICES)
    }
}

#[async_trait]
impl HoldingsRepository for MongoStore {
    async fn list(&self) -> StoreResult<Vec<Holding>> {
        let find_opts = FindOptions::builder().sort(doc! { "symbol": 1 }).build();
        let mut cursor = self.holdings().find(doc! {}, find_opts).await?;

        let mut out: Vec<Holding> = vec![];
        while let Some(res) = cursor.next().await {
            out.push(res?.try_into()?);
        }
        Ok(out)
    }

    async fn find_by_symbol(&self, symbol: &str) -> StoreResult<Option<Holding>> {
        let sym = symbol.to_uppercase();
        match self.holdings().find_one(doc! { "symbol": &sym }, None).await? {
            Some(d) => Ok(Some(d.try_into()?)),
            None => Ok(None),
        }
    }

    async fn create(&self, input: &HoldingInput) -> StoreResult<String> {
        let holding = HoldingDoc {
            id: ObjectId::new(),
            symbol: input.symbol.to_uppercase(),
            label: input.label.clone(),
            shares: input.shares,
            target_weight: input.target_weight,
            created_at: Utc::now().timestamp_millis(),
        };

        self.holdings().insert_one(&holding, None).await?;
        Ok(holding.id.to_hex())
    }

    async fn increment(
        &self,
        symbol: &str,
        shares_to_add: f64,
        target_weight: f64,
        label: Option<&str>,
    ) -> StoreResult<u64> {
        let mut set = doc! { "target_weight": target_weight };
        if let Some(label) = label {
            set.insert("label", label);
        }

        let res = self
            .holdings()
            .update_one(
                doc! { "symbol": symbol.to_uppercase() },
                doc! { "$inc": { "shares": shares_to_add }, "$set": set },
                None,
            )
            .await?;
        Ok(res.matched_count)
    }

    async fn update(&self, id: &str, input: &HoldingInput) -> StoreResult<u64> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(0);
        };

        let res = self
            .holdings()
            .update_one(
                doc! { "_id": oid },
                doc! {
                    "$set": {
                        "symbol": input.symbol.to_uppercase(),
                        "label": input.label.as_deref(),
                        "shares": input.shares,
                        "target_weight": input.target_weight,
                    }
                },
                None,
            )
            .await?;
        Ok(res.matched_count)
    }

    async fn delete(&self, id: &str) -> StoreResult<u64> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(0);
        };
        let res = self.holdings().delete_one(doc! { "_id": oid }, None).await?;
        Ok(res.deleted_count)
    }
}

#[async_trait]
impl PriceRepository for MongoStore {
    async fn latest_per_symbol(&self) -> StoreResult<Vec<LatestPrice>> {
        // dates are stored as YYYY-MM-DD, so string order is date order
        let pipeline = vec![
            doc! { "$sort": { "symbol": 1, "date": -1 } },
            doc! {
                "$group": {
                    "_id": "$symbol",
                    "date": { "$first": "$date" },
                    "close": { "$first": "$close" },
                }
            },
            doc! { "$sort": { "_id": 1 } },
        ];

        let mut cursor = self.prices().aggregate(pipeline, None).await?;

        let mut out: Vec<LatestPrice> = vec![];
        while let Some(res) = cursor.next().await {
            let row = res?;
            let symbol = row
                .get_str("_id")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let date = row
                .get_str("date")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let close = row
                .get_f64("close")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;

            out.push(LatestPrice {
                symbol: symbol.to_string(),
                date: parse_date(date)?,
                close,
            });
        }
        Ok(out)
    }

    async fn upsert(&self, symbol: &str, close: &DailyClose, source: &str) -> StoreResult<()> {
        self.prices()
            .update_one(
                doc! { "symbol": symbol.to_uppercase(), "date": close.date.to_string() },
                doc! {
                    "$set": {
                        "close": close.close,
                        "source": source,
                        "ingested_at": Utc::now().timestamp_millis(),
                    }
                },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MongoStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Setting>> {
        let Some(d) = self.settings().find_one(doc! { "_id": key }, None).await? else {
            return Ok(None);
        };

        Ok(Some(Setting {
            key: d.key,
            value_json: d.value_json,
            updated_at: millis_to_utc(d.updated_at)?,
        }))
    }

    async fn put(&self, key: &str, value_json: &str) -> StoreResult<()> {
        self.settings()
            .update_one(
                doc! { "_id": key },
                doc! {
                    "$set": {
                        "value_json": value_json,
                        "updated_at": Utc::now().timestamp_millis(),
                    }
                },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value_json: &str) -> StoreResult<bool> {
        let res = self
            .settings()
            .update_one(
                doc! { "_id": key },
                doc! {
                    "$setOnInsert": {
                        "value_json": value_json,
                        "updated_at": Utc::now().timestamp_millis(),
                    }
                },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(res.upserted_id.is_some())
    }
}

#[async_trait]
impl DecisionRepository for MongoStore {
    async fn count_open(
        &self,
        decision_type: &str,
        symbol: &str,
        last_close_date: NaiveDate,
    ) -> StoreResult<u64> {
        let open: Vec<&str> = DecisionStatus::OPEN_STATES.iter().map(|s| s.as_str()).collect();

        let n = self
            .decisions()
            .count_documents(
                doc! {
                    "decision_type": decision_type,
                    "status": { "$in": open },
                    "payload.symbol": symbol.to_uppercase(),
                    "payload.lastCloseDate": last_close_date.to_string(),
                },
                None,
            )
            .await?;
        Ok(n)
    }

    async fn insert(&self, decision: &NewDecision) -> StoreResult<InsertOutcome> {
        let now = Utc::now().timestamp_millis();
        let dedupe_key = decision.payload.dedupe_key();

        let row = DecisionDoc {
            id: ObjectId::new(),
            decision_type: decision.payload.decision_type().to_string(),
            status: decision.status,
            rationale: decision.rationale.clone(),
            payload: payload_body(&decision.payload)?,
            open_key: decision.status.is_open_state().then(|| dedupe_key.clone()),
            dedupe_key,
            created_at: now,
            updated_at: now,
        };

        match self.decisions().insert_one(&row, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted(row.id.to_hex())),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, status: Option<DecisionStatus>, limit: usize) -> StoreResult<Vec<Decision>> {
        let filter = match status {
            Some(st) => doc! { "status": st.as_str() },
            None => doc! {},
        };
        let find_opts = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit(limit as i64)
            .build();

        let mut cursor = self.decisions().find(filter, find_opts).await?;

        let mut out: Vec<Decision> = vec![];
        while let Some(res) = cursor.next().await {
            out.push(res?.try_into()?);
        }
        Ok(out)
    }

    async fn update_status(&self, id: &str, status: DecisionStatus) -> StoreResult<u64> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(0);
        };
        let now = Utc::now().timestamp_millis();

        // pipeline update so open_key can be restored from dedupe_key
        let pipeline = if status.is_open_state() {
            vec![doc! {
                "$set": {
                    "status": status.as_str(),
                    "updated_at": now,
                    "open_key": "$dedupe_key",
                }
            }]
        } else {
            vec![
                doc! { "$set": { "status": status.as_str(), "updated_at": now } },
                doc! { "$unset": "open_key" },
            ]
        };

        let res = self
            .decisions()
            .update_one(doc! { "_id": oid }, pipeline, None)
            .await?;
        Ok(res.matched_count)
    }
}

#[async_trait]
impl StorageHealth for MongoStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DriftSnapshot;

    fn drift() -> DecisionPayload {
        DecisionPayload::PortfolioDrift(DriftSnapshot {
            symbol: "VTI".into(),
            target_weight: 0.6,
            current_weight: 0.7,
            delta: 0.1,
            shares: 10.0,
            last_close: 70.0,
            last_close_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            market_value: 700.0,
            portfolio_value: 1000.0,
        })
    }

    fn decision_doc(payload: &DecisionPayload, open_key: Option<String>) -> DecisionDoc {
        DecisionDoc {
            id: ObjectId::new(),
            decision_type: payload.decision_type().to_string(),
            status: DecisionStatus::Open,
            rationale: "VTI is overweight by 10.00% vs target.".into(),
            payload: payload_body(payload).unwrap(),
            dedupe_key: payload.dedupe_key(),
            open_key,
            created_at: 1_709_251_200_000,
            updated_at: 1_709_251_200_000,
        }
    }

    #[test]
    fn payload_body_drops_the_tag_and_keeps_camel_case_fields() {
        let body = payload_body(&drift()).unwrap();

        assert!(!body.contains_key("decisionType"));
        assert_eq!(body.get_str("symbol").unwrap(), "VTI");
        assert_eq!(body.get_str("lastCloseDate").unwrap(), "2024-03-01");
        assert_eq!(body.get_f64("portfolioValue").unwrap(), 1000.0);
    }

    #[test]
    fn stored_decision_maps_back_to_the_same_payload() {
        let payload = drift();
        let row = decision_doc(&payload, Some(payload.dedupe_key()));
        let id = row.id.to_hex();

        let stored = bson::to_document(&row).unwrap();
        let back: DecisionDoc = bson::from_document(stored).unwrap();
        let decision = Decision::try_from(back).unwrap();

        assert_eq!(decision.id, id);
        assert_eq!(decision.status, DecisionStatus::Open);
        assert_eq!(decision.payload, payload);
        assert_eq!(decision.created_at.timestamp_millis(), 1_709_251_200_000);
    }

    #[test]
    fn open_key_is_left_out_when_closed() {
        let payload = drift();

        let closed = bson::to_document(&decision_doc(&payload, None)).unwrap();
        assert!(!closed.contains_key("open_key"));
        assert_eq!(closed.get_str("status").unwrap(), "open");

        let open = bson::to_document(&decision_doc(&payload, Some(payload.dedupe_key()))).unwrap();
        assert_eq!(open.get_str("open_key").unwrap(), "portfolio.drift|VTI|2024-03-01");
    }

    #[test]
    fn unknown_decision_type_is_an_error() {
        let mut row = decision_doc(&drift(), None);
        row.decision_type = "portfolio.unknown".into();
        assert!(Decision::try_from(row).is_err());
    }

    #[test]
    fn holding_doc_converts_millis() {
        let doc = HoldingDoc {
            id: ObjectId::new(),
            symbol: "BND".into(),
            label: None,
            shares: 4.0,
            target_weight: 0.4,
            created_at: 1_709_251_200_000,
        };
        let hex = doc.id.to_hex();

        let holding = Holding::try_from(doc).unwrap();
        assert_eq!(holding.id, hex);
        assert_eq!(holding.created_at.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }
}
