mod common;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get as route_get,
    Json, Router,
};
use common::*;
use cryptofolio::services::price_service::{CoinGeckoClient, PriceSource};
use cryptofolio::{MemoryStore, PortfolioStore};
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct MockState {
    calls: Arc<AtomicUsize>,
}

async fn simple_price(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let mut out = serde_json::Map::new();
    for id in params.get("ids").map(|s| s.split(',')).into_iter().flatten() {
        let entry = match id {
            "bitcoin" => json!({
                "usd": 42500.0,
                "usd_24h_change": 1.25,
                "usd_market_cap": 830000000000.0,
                "usd_24h_vol": 21000000000.0
            }),
            "ethereum" => json!({ "usd": 3000.0, "usd_24h_vol": 9000000000.0 }),
            _ => continue,
        };
        out.insert(id.to_string(), entry);
    }
    Json(serde_json::Value::Object(out))
}

async fn coin_details(Path(id): Path<String>) -> impl IntoResponse {
    if id != "bitcoin" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "coin not found" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "market_data": {
                "current_price": { "usd": 42500.0 },
                "price_change_percentage_24h": 1.25,
                "market_cap": { "usd": 830000000000.0 },
                "total_volume": { "usd": 21000000000.0 },
                "circulating_supply": 19600000.0
            }
        })),
    )
}

/// Serves a minimal price API on an ephemeral port.
async fn spawn_mock() -> (String, MockState) {
    let state = MockState::default();
    let router = Router::new()
        .route("/simple/price", route_get(simple_price))
        .route("/coins/:id", route_get(coin_details))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", address), state)
}

async fn client() -> (CoinGeckoClient, MockState) {
    let (url, state) = spawn_mock().await;
    (CoinGeckoClient::new(&url, Duration::from_secs(5)).unwrap(), state)
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_batch_omits_unknown_and_missing_symbols() {
    let (client, mock) = client().await;

    let prices = client.get_prices(&symbols(&["btc", "ETH", "DOGE", "NOPE"])).await;

    assert_eq!(prices.len(), 2);
    assert_eq!(prices["BTC"].price_usd, 42500.0);
    assert_eq!(prices["BTC"].volume_24h, 21000000000.0);
    assert_eq!(prices["ETH"].name, "Ethereum");
    assert!(!prices.contains_key("DOGE"));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_repeated_fetch_is_stable() {
    let (client, _) = client().await;
    let wanted = symbols(&["BTC", "ETH"]);

    let first = client.get_prices(&wanted).await;
    let second = client.get_prices(&wanted).await;

    for symbol in &wanted {
        assert_eq!(first[symbol].price_usd, second[symbol].price_usd);
    }
}

#[tokio::test]
async fn test_coin_details() {
    let (client, _) = client().await;

    let details = client.get_coin_details("btc").await.unwrap();
    assert_eq!(details.symbol, "BTC");
    assert_eq!(details.circulating_supply, 19600000.0);

    assert!(client.get_coin_details("ETH").await.is_none());
}

async fn api() -> (axum::Router, Arc<MemoryStore>) {
    let (client, _) = client().await;
    let store = Arc::new(MemoryStore::new());
    (app(store.clone(), StubAuth::default(), Arc::new(client)), store)
}

#[tokio::test]
async fn test_prices_endpoint() {
    let (app, _) = api().await;

    let (status, body) = call(&app, get("/api/prices?symbols=btc,%20eth", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["data"]["BTC"]["price_usd"], json!(42500.0));

    let (status, body) = call(&app, get("/api/prices", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("symbols parameter required (comma-separated)"));
}

#[tokio::test]
async fn test_more_than_fifty_symbols_is_rejected() {
    let (app, _) = api().await;
    let list = vec!["BTC"; 51].join(",");

    let (status, body) = call(&app, get(&format!("/api/prices?symbols={}", list), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Maximum 50 symbols allowed per request"));
}

#[tokio::test]
async fn test_single_price_not_found() {
    let (app, _) = api().await;

    let (status, body) = call(&app, get("/api/prices/btc", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbol"], json!("BTC"));

    let (status, body) = call(&app, get("/api/prices/doge", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Price not found for symbol: DOGE"));
}

#[tokio::test]
async fn test_update_requires_api_key() {
    let (app, store) = api().await;

    let (status, body) = call(&app, post_cron("/api/prices/update", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["updated"], json!(0));
    assert_eq!(body["failed"], json!(0));
    assert_eq!(body["error"], json!("Unauthorized - Invalid API key"));

    let (status, _) = call(&app, post_cron("/api/prices/update", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(store.get_latest_price("BTC").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_persists_history() {
    let (app, store) = api().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/prices/update")
        .header("x-api-key", CRON_KEY)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "symbols": ["btc", "eth", "nope"] }).to_string()))
        .unwrap();
    let (status, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], json!(2));
    assert_eq!(body["failed"], json!(0));
    assert_eq!(body["message"], json!("Updated 2 prices, 0 failed"));

    let latest = store.get_latest_price("BTC").await.unwrap().unwrap();
    assert_eq!(latest.price_usd, dec!(42500));
    assert_eq!(latest.source, "coingecko");

    let (status, history) = call(&app, get("/api/prices/BTC/history?days=1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
}
