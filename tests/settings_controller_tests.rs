mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{response_body_string, response_json, test_app};
use portfolio_sentinel::{routes, services::settings_service};
use tower::ServiceExt;

fn put_threshold(body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/api/settings/drift-threshold")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn threshold_defaults_then_updates() {
    let app = test_app();
    let router = routes::app(app.state);

    let res = router.clone().oneshot(get("/api/settings/drift-threshold")).await.unwrap();
    assert_eq!(response_json(res).await["pct"], 0.05);

    let res = router.clone().oneshot(put_threshold(r#"{"pct":0.1}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = router.oneshot(get("/api/settings/drift-threshold")).await.unwrap();
    assert_eq!(response_json(res).await["pct"], 0.1);
}

#[tokio::test]
async fn numeric_string_threshold_is_accepted() {
    let app = test_app();
    let router = routes::app(app.state);

    let res = router.oneshot(put_threshold(r#"{"pct":"0.2"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(response_json(res).await["pct"], 0.2);
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let app = test_app();
    let router = routes::app(app.state.clone());

    for body in [r#"{"pct":1.5}"#, r#"{"pct":-0.1}"#, r#"{"pct":"x"}"#, r#"{}"#] {
        let res = router.clone().oneshot(put_threshold(body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(response_json(res).await["error"], "invalid_pct");
    }

    let pct = settings_service::drift_threshold(app.state.repos.settings.as_ref())
        .await
        .unwrap();
    assert_eq!(pct, 0.05);
}

#[tokio::test]
async fn seeding_keeps_operator_value() {
    let app = test_app();
    let repo = app.state.repos.settings.as_ref();

    settings_service::seed_defaults(repo).await.unwrap();
    assert_eq!(settings_service::drift_threshold(repo).await.unwrap(), 0.05);

    settings_service::set_drift_threshold(repo, 0.08).await.unwrap();
    settings_service::seed_defaults(repo).await.unwrap();
    assert_eq!(settings_service::drift_threshold(repo).await.unwrap(), 0.08);
}

#[tokio::test]
async fn health_endpoints_report_backend() {
    let app = test_app();
    let router = routes::app(app.state);

    let res = router.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(response_json(res).await["ok"], true);

    let res = router.oneshot(get("/api/health/db")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(response_json(res).await["backend"], "memory");
}

#[tokio::test]
async fn dashboard_and_not_found_pages_render() {
    let app = test_app();
    common::add_holding(&app.state, "VTI", 10.0, 0.6).await;
    let router = routes::app(app.state);

    let res = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = response_body_string(res).await;
    assert!(body.contains("Portfolio Sentinel"));
    assert!(body.contains("VTI"));
    assert!(body.contains("threshold 5.00%"));

    let res = router.clone().oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(response_body_string(res).await.contains("/nowhere"));

    let res = router.oneshot(get("/api/nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(res).await["error"], "not_found");
}
