//! Runs against a live MongoDB at `MONGODB_URI`; `cargo test -- --ignored`.

mod common;

use common::{day, drift_decision};
use mongodb::{bson::oid::ObjectId, Client, Database};
use portfolio_sentinel::{
    config,
    errors::StoreError,
    models::{DailyClose, DecisionStatus, InsertOutcome, PORTFOLIO_DRIFT},
    repositories::Repositories,
    services::db_init,
};

async fn test_db() -> Database {
    let settings = config::load();

    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .expect("mongodb client");
    // fresh database per test so runs do not see each other
    let db = client.database(&format!("portfolio_sentinel_test_{}", ObjectId::new().to_hex()));

    db_init::ensure_indexes(&db).await.expect("indexes");
    db
}

#[tokio::test]
#[ignore]
async fn second_open_decision_for_the_same_key_is_a_duplicate() {
    let db = test_db().await;
    let repos = Repositories::mongo(db.clone());

    let first = repos
        .decisions
        .insert(&drift_decision("VTI", "2024-03-01", DecisionStatus::Open))
        .await
        .unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(_)));

    let second = repos
        .decisions
        .insert(&drift_decision("VTI", "2024-03-01", DecisionStatus::Snoozed))
        .await
        .unwrap();
    assert_eq!(second, InsertOutcome::Duplicate);

    // terminal rows never hold the key
    let dismissed = repos
        .decisions
        .insert(&drift_decision("VTI", "2024-03-01", DecisionStatus::Dismissed))
        .await
        .unwrap();
    assert!(matches!(dismissed, InsertOutcome::Inserted(_)));

    let n = repos
        .decisions
        .count_open(PORTFOLIO_DRIFT, "vti", day("2024-03-01"))
        .await
        .unwrap();
    assert_eq!(n, 1);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn reopening_behind_a_newer_open_decision_conflicts() {
    let db = test_db().await;
    let repos = Repositories::mongo(db.clone());

    let InsertOutcome::Inserted(old_id) = repos
        .decisions
        .insert(&drift_decision("BND", "2024-03-01", DecisionStatus::Open))
        .await
        .unwrap()
    else {
        panic!("first decision was not inserted");
    };

    assert_eq!(
        repos.decisions.update_status(&old_id, DecisionStatus::Dismissed).await.unwrap(),
        1
    );
    let fresh = repos
        .decisions
        .insert(&drift_decision("BND", "2024-03-01", DecisionStatus::Open))
        .await
        .unwrap();
    assert!(matches!(fresh, InsertOutcome::Inserted(_)));

    let err = repos
        .decisions
        .update_status(&old_id, DecisionStatus::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // moving between terminal states is always allowed
    assert_eq!(
        repos.decisions.update_status(&old_id, DecisionStatus::Done).await.unwrap(),
        1
    );

    let open = repos.decisions.list(Some(DecisionStatus::Open), 10).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_ne!(open[0].id, old_id);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn latest_price_is_the_newest_date_per_symbol() {
    let db = test_db().await;
    let repos = Repositories::mongo(db.clone());

    for (symbol, date, close) in [
        ("VTI", "2024-02-28", 240.0),
        ("VTI", "2024-03-01", 245.5),
        ("VTI", "2024-02-29", 242.0),
        ("BND", "2024-02-29", 72.1),
    ] {
        repos
            .prices
            .upsert(symbol, &DailyClose { date: day(date), close }, "test")
            .await
            .unwrap();
    }
    // same day again replaces the close
    repos
        .prices
        .upsert("bnd", &DailyClose { date: day("2024-02-29"), close: 72.4 }, "test")
        .await
        .unwrap();

    let latest = repos.prices.latest_per_symbol().await.unwrap();
    assert_eq!(latest.len(), 2);

    assert_eq!(latest[0].symbol, "BND");
    assert_eq!(latest[0].date, day("2024-02-29"));
    assert_eq!(latest[0].close, 72.4);

    assert_eq!(latest[1].symbol, "VTI");
    assert_eq!(latest[1].date, day("2024-03-01"));
    assert_eq!(latest[1].close, 245.5);

    db.drop(None).await.unwrap();
}
