use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::mobility::router::{mobility_router, USER_HEADER};

fn post_json(uri: &str, user: &str, payload: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(USER_HEADER, user)
        .body(Body::from(serde_json::to_vec(&payload).expect("payload")))
        .expect("request builds")
}

fn post_empty(uri: &str, user: &str) -> Request<Body> {
    Request::post(uri)
        .header(USER_HEADER, user)
        .body(Body::empty())
        .expect("request builds")
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::get(uri)
        .header(USER_HEADER, user)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .oneshot(
            Request::get("/api/v1/trips")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recommend_rejects_blank_addresses() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .oneshot(post_json(
            "/api/v1/trips/recommendations",
            "user-1",
            json!({ "origin_address": "  ", "destination_address": "Gangnam Station" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recommend_maps_resolution_failures_to_unprocessable() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .oneshot(post_json(
            "/api/v1/trips/recommendations",
            "user-1",
            json!({
                "origin_address": "nowhere in particular",
                "destination_address": "Gangnam Station"
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn full_trip_flow_pays_and_reports_through_the_wallet() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/trips/recommendations",
            "user-1",
            json!({
                "origin_address": "Seoul Station",
                "destination_address": "Gangnam Station",
                "region_code": "gangnam"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let recommendation = read_json_body(response).await;
    let rec_id = recommendation
        .get("id")
        .and_then(serde_json::Value::as_str)
        .expect("recommendation id")
        .to_string();
    assert!(recommendation.get("rationale").is_some());

    let response = router
        .clone()
        .oneshot(post_empty(
            &format!("/api/v1/trips/recommendations/{rec_id}/start"),
            "user-1",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let started = read_json_body(response).await;
    let trip_id = started
        .pointer("/trip/id")
        .and_then(serde_json::Value::as_str)
        .expect("trip id")
        .to_string();
    let departure_amount = started
        .pointer("/departure_reward/amount")
        .and_then(serde_json::Value::as_i64)
        .expect("departure amount");
    assert!(departure_amount >= 100);
    assert_eq!(
        started.pointer("/trip/status"),
        Some(&json!("ongoing"))
    );

    let replay = router
        .clone()
        .oneshot(post_empty(
            &format!("/api/v1/trips/recommendations/{rec_id}/start"),
            "user-1",
        ))
        .await
        .expect("route executes");
    assert_eq!(replay.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/trips/{trip_id}/arrive"), "user-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let completed = read_json_body(response).await;
    let completion_amount = completed
        .pointer("/completion_reward/amount")
        .and_then(serde_json::Value::as_i64)
        .expect("completion amount");
    assert!(completion_amount >= 50);
    assert_eq!(completed.pointer("/trip/status"), Some(&json!("arrived")));

    let replay = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/trips/{trip_id}/arrive"), "user-1"))
        .await
        .expect("route executes");
    assert_eq!(replay.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(get("/api/v1/wallet/summary", "user-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let summary = read_json_body(response).await;
    assert_eq!(
        summary.get("balance").and_then(serde_json::Value::as_i64),
        Some(departure_amount + completion_amount)
    );
    assert_eq!(
        summary
            .get("transaction_count")
            .and_then(serde_json::Value::as_u64),
        Some(2)
    );

    let response = router
        .clone()
        .oneshot(get("/api/v1/wallet/transactions?page=1&page_size=1", "user-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let page = read_json_body(response).await;
    assert_eq!(page.get("total").and_then(serde_json::Value::as_u64), Some(2));
    assert_eq!(
        page.get("entries")
            .and_then(serde_json::Value::as_array)
            .map(Vec::len),
        Some(1)
    );

    let response = router
        .oneshot(get("/api/v1/trips", "user-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let history = read_json_body(response).await;
    assert_eq!(
        history
            .get("trips")
            .and_then(serde_json::Value::as_array)
            .map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn start_on_foreign_recommendation_is_forbidden() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/trips/recommendations",
            "user-1",
            json!({
                "origin_address": "Seoul Station",
                "destination_address": "Gangnam Station"
            }),
        ))
        .await
        .expect("route executes");
    let rec_id = read_json_body(response)
        .await
        .get("id")
        .and_then(serde_json::Value::as_str)
        .expect("recommendation id")
        .to_string();

    let response = router
        .oneshot(post_empty(
            &format!("/api/v1/trips/recommendations/{rec_id}/start"),
            "user-2",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn optimal_time_reports_a_ranked_selection() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let response = router
        .oneshot(get(
            "/api/v1/trips/optimal-time?window_hours=2&current_time=2026-03-04%2009:00&location=gangnam",
            "user-1",
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload
            .get("slots_analyzed")
            .and_then(serde_json::Value::as_u64),
        Some(4)
    );
    assert_eq!(payload.get("precision"), Some(&json!("normal")));
    assert!(payload.pointer("/best/score").is_some());
    assert_eq!(
        payload
            .get("alternatives")
            .and_then(serde_json::Value::as_array)
            .map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn optimal_time_validates_its_inputs() {
    let stack = build_stack();
    let router = mobility_router(stack.services.clone());

    let bad_window = router
        .clone()
        .oneshot(get("/api/v1/trips/optimal-time?window_hours=48", "user-1"))
        .await
        .expect("route executes");
    assert_eq!(bad_window.status(), StatusCode::BAD_REQUEST);

    let bad_time = router
        .oneshot(get(
            "/api/v1/trips/optimal-time?current_time=not-a-time",
            "user-1",
        ))
        .await
        .expect("route executes");
    assert_eq!(bad_time.status(), StatusCode::BAD_REQUEST);
}
