//! Integration tests for truthlens-server API endpoints
//!
//! Drives the router over an in-memory SQLite pool with the analyzer in
//! its deterministic fallback configuration, so no test touches the
//! network.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use truthlens_common::events::EventBus;
use truthlens_server::services::forensic::GeminiAnalyzer;
use truthlens_server::services::web2::MockReviewSource;
use truthlens_server::{build_router, AppState, ResolverParams};

/// Test helper: state over an in-memory database, analyzer unconfigured
async fn setup_state() -> AppState {
    let pool = truthlens_server::db::init_memory_pool()
        .await
        .expect("Should create in-memory database");

    AppState::new(
        pool,
        EventBus::new(64),
        Arc::new(GeminiAnalyzer::new(None)),
        Arc::new(MockReviewSource),
        ResolverParams::default(),
    )
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_router(setup_state().await);

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "truthlens-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// Scan endpoint
// =============================================================================

#[tokio::test]
async fn test_scan_rejects_empty_name() {
    let app = build_router(setup_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": "   ", "location": "Taipei"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_scan_new_restaurant_returns_pending() {
    let state = setup_state().await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": "Din Tai Fung", "location": "Taipei"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["found"], false);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["report"]["restaurant_key"], "din-tai-fung_taipei");

    // The record exists in the store immediately
    let stored = truthlens_server::db::reports::fetch_by_key(&state.db, "din-tai-fung_taipei")
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_scan_is_idempotent_on_restaurant_key() {
    let state = setup_state().await;

    let first = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": "Din Tai Fung", "location": "Taipei"}),
        ))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;

    // Same restaurant, different casing and spacing
    let second = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": "din  tai fung", "location": "TAIPEI"}),
        ))
        .await
        .unwrap();
    let second = extract_json(second.into_body()).await;

    // Both observe the same underlying record: no duplicate rows
    assert_eq!(first["report"]["id"], second["report"]["id"]);

    let reports = truthlens_server::db::reports::list_all(&state.db).await.unwrap();
    assert_eq!(reports.len(), 1);
}

// =============================================================================
// Audit endpoint
// =============================================================================

#[tokio::test]
async fn test_audit_start_requires_fields() {
    let app = build_router(setup_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/audit/start",
            json!({"restaurantId": "", "restaurantName": ""}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_audit_completes_with_fallback_analyzer() {
    let state = setup_state().await;

    // Create the scanning record first
    build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": "Ramen 57", "location": "Tokyo"}),
        ))
        .await
        .unwrap();

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/audit/start",
            json!({
                "restaurantId": "ramen-57_tokyo",
                "restaurantName": "Ramen 57",
                "location": "Tokyo"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "ready");

    // Fallback truth score stays inside the clamp band
    let truth_score = body["truthScore"].as_f64().unwrap();
    assert!((2.5..=4.5).contains(&truth_score));

    // The stored record carries analysis fields and evidence
    let report = truthlens_server::db::reports::fetch_by_key(&state.db, "ramen-57_tokyo")
        .await
        .unwrap()
        .unwrap();
    assert!(report.ai_score.is_some());
    assert!(report.last_analysis_at.is_some());
    assert_eq!(report.evidence_items.len(), 3);
    assert_eq!(report.confidence, 0);
}

// =============================================================================
// Verification endpoint
// =============================================================================

/// Helper: resolve + audit so a ready record exists for `key`
async fn prepare_ready_report(state: &AppState, name: &str, location: &str, key: &str) {
    build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/scan",
            json!({"restaurantName": name, "location": location}),
        ))
        .await
        .unwrap();

    truthlens_server::services::resolver::run_audit(state, key, name, location)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verification_raises_confidence() {
    let state = setup_state().await;
    prepare_ready_report(&state, "Chez Paul", "Paris", "chez-paul_paris").await;

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/verify",
            json!({
                "restaurantKey": "chez-paul_paris",
                "verifierId": "agent-1",
                "score": 3.0,
                "evidenceRef": "receipt-abc123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["report"]["verification_count"], 1);
    // One verification out of a 50 threshold: round(2%) confidence
    assert_eq!(body["report"]["confidence"], 2);
    assert_eq!(body["report"]["lifecycle_status"], "ready");
}

#[tokio::test]
async fn test_verification_rejects_out_of_range_score() {
    let state = setup_state().await;
    prepare_ready_report(&state, "Chez Paul", "Paris", "chez-paul_paris").await;

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/verify",
            json!({
                "restaurantKey": "chez-paul_paris",
                "verifierId": "agent-1",
                "score": 7.5,
                "evidenceRef": "receipt-abc123"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verification_unknown_key_is_404() {
    let app = build_router(setup_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/verify",
            json!({
                "restaurantKey": "nowhere_unknown",
                "verifierId": "agent-1",
                "score": 3.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saturated_verifications_override_ai_score() {
    let state = setup_state().await;
    prepare_ready_report(&state, "Hype House", "LA", "hype-house_la").await;

    for i in 0..50 {
        truthlens_server::services::resolver::submit_verification(
            &state,
            "hype-house_la",
            &format!("agent-{}", i),
            2.0,
            &format!("receipt-{}", i),
        )
        .await
        .unwrap();
    }

    let report = truthlens_server::db::reports::fetch_by_key(&state.db, "hype-house_la")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.final_score, 2.0);
    assert_eq!(report.confidence, 100);
    assert_eq!(report.verification_status.as_str(), "VERIFIED");
    assert_eq!(report.verification_count, 50);
}

// =============================================================================
// Report endpoints
// =============================================================================

#[tokio::test]
async fn test_get_report_404_when_missing() {
    let app = build_router(setup_state().await);

    let response = app
        .oneshot(get_request("/api/report/nothing_here"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_reports_and_verifications() {
    let state = setup_state().await;
    prepare_ready_report(&state, "A", "X", "a_x").await;
    prepare_ready_report(&state, "B", "Y", "b_y").await;

    build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/verify",
            json!({"restaurantKey": "a_x", "verifierId": "v1", "score": 4.0}),
        ))
        .await
        .unwrap();

    let response = build_router(state.clone())
        .oneshot(get_request("/api/reports"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 2);

    let response = build_router(state.clone())
        .oneshot(get_request("/api/report/a_x/verifications"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["verifications"][0]["verifier_id"], "v1");
}

// =============================================================================
// Debunk transition
// =============================================================================

#[tokio::test]
async fn test_debunk_is_terminal() {
    let state = setup_state().await;
    prepare_ready_report(&state, "Fake Star", "NY", "fake-star_ny").await;

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/report/fake-star_ny/debunk",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["lifecycle_status"], "debunked");

    // A verification still lands but does not revive the record
    build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/verify",
            json!({"restaurantKey": "fake-star_ny", "verifierId": "v1", "score": 1.0}),
        ))
        .await
        .unwrap();

    // Re-running the audit pipeline does not revive it either
    truthlens_server::services::resolver::run_audit(&state, "fake-star_ny", "Fake Star", "NY")
        .await
        .unwrap();

    let report = truthlens_server::db::reports::fetch_by_key(&state.db, "fake-star_ny")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.lifecycle_status.as_str(), "debunked");
    assert_eq!(report.verification_count, 1);
}
