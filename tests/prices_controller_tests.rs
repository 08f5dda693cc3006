mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{add_holding, day, response_json, test_app};
use portfolio_sentinel::routes;
use tower::ServiceExt;

#[tokio::test]
async fn refresh_stores_prices_and_reports_failures() {
    let app = test_app();
    add_holding(&app.state, "VTI", 10.0, 0.6).await;
    add_holding(&app.state, "BND", 5.0, 0.4).await;
    add_holding(&app.state, "AAA", 1.0, 0.0).await;
    app.feed.set("VTI", day("2024-06-03"), 262.5);
    app.feed.set("BND", day("2024-06-03"), 72.1);

    let mut rx = app.state.events_tx.subscribe();
    let router = routes::app(app.state.clone());

    let res = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/prices/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = response_json(res).await;
    assert_eq!(body["refreshed"], 3);

    // symbol order
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["symbol"], "AAA");
    assert_eq!(results[0]["ok"], false);
    assert_eq!(results[0]["error"], "stooq_empty");
    assert_eq!(results[1]["symbol"], "BND");
    assert_eq!(results[1]["ok"], true);
    assert_eq!(results[2]["symbol"], "VTI");
    assert_eq!(results[2]["date"], "2024-06-03");
    assert_eq!(results[2]["close"], 262.5);

    assert_eq!(rx.try_recv().unwrap(), "pricesUpdated");

    let res = router
        .oneshot(
            Request::builder()
                .uri("/api/prices/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let latest = response_json(res).await;
    let latest = latest.as_array().unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().any(|p| p["symbol"] == "VTI" && p["close"] == 262.5));
}

#[tokio::test]
async fn refresh_upserts_same_day_and_latest_wins() {
    let app = test_app();
    add_holding(&app.state, "VTI", 10.0, 1.0).await;

    app.feed.set("VTI", day("2024-06-03"), 260.0);
    portfolio_sentinel::services::prices_service::refresh_prices(&app.state)
        .await
        .unwrap();
    app.feed.set("VTI", day("2024-06-03"), 261.0);
    portfolio_sentinel::services::prices_service::refresh_prices(&app.state)
        .await
        .unwrap();

    let latest = app.state.repos.prices.latest_per_symbol().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].close, 261.0);

    app.feed.set("VTI", day("2024-06-04"), 255.0);
    portfolio_sentinel::services::prices_service::refresh_prices(&app.state)
        .await
        .unwrap();

    let latest = app.state.repos.prices.latest_per_symbol().await.unwrap();
    assert_eq!(latest[0].date, day("2024-06-04"));
    assert_eq!(latest[0].close, 255.0);
}

#[tokio::test]
async fn refresh_with_no_holdings_is_empty() {
    let app = test_app();

    let summary = portfolio_sentinel::services::prices_service::refresh_prices(&app.state)
        .await
        .unwrap();
    assert_eq!(summary.refreshed, 0);
    assert!(summary.results.is_empty());
}
