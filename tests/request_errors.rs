mod common;

use axum::http::StatusCode;
use common::*;
use cryptofolio::MemoryStore;
use serde_json::json;
use std::sync::Arc;

const TOKEN: &str = "token-alice";

async fn setup() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    store.add_user("auth-alice", "alice@example.com").await;
    app(
        store,
        StubAuth::default().with(TOKEN, "auth-alice"),
        Arc::new(StubPrices::default()),
    )
}

fn assert_envelope(body: &serde_json::Value) {
    assert_eq!(body["success"], json!(false), "{}", body);
    assert!(body["error"].is_string(), "{}", body);
}

#[tokio::test]
async fn test_auth_is_checked_before_the_body() {
    let app = setup().await;

    let (status, body) = call(&app, post_json("/api/alerts", None, &json!({ "symbol": "BTC" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body);

    let (status, body) = call(&app, post_json("/api/wallets/verify", None, &json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body);

    let (status, body) = call(&app, get("/api/withdrawals/not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body);
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() {
    let app = setup().await;

    let (status, body) = call(&app, post_json("/api/alerts", Some(TOKEN), &json!({ "symbol": "BTC" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    let (status, body) = call(&app, post_json("/api/wallets/verify", Some(TOKEN), &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
}

#[tokio::test]
async fn test_bad_path_and_query_values_keep_the_envelope() {
    let app = setup().await;

    for uri in [
        "/api/withdrawals/not-a-uuid",
        "/api/withdrawals?limit=many",
        "/api/alerts?active_only=maybe",
    ] {
        let (status, body) = call(&app, get(uri, Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_envelope(&body);
    }

    let (status, body) = call(&app, get("/api/prices/BTC/history?days=abc", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);

    let delete = axum::http::Request::builder()
        .method("DELETE")
        .uri("/api/alerts/42")
        .header("authorization", format!("Bearer {}", TOKEN))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = call(&app, delete).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
}
