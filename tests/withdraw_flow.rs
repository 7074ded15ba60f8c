mod common;

use axum::http::StatusCode;
use common::*;
use cryptofolio::{AuditAction, MemoryStore, PortfolioStore, Wallet, WithdrawalStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const TOKEN: &str = "token-alice";

struct Fixture {
    store: Arc<MemoryStore>,
    wallet: Wallet,
    user_id: Uuid,
}

async fn fixture(btc_balance: Decimal) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user("auth-alice", "alice@example.com").await;
    let wallet = store.add_wallet(user.id, "0x1111111111111111111111111111111111111111").await;
    store.add_asset(&wallet, "BTC", btc_balance, Some(dec!(42500))).await;
    Fixture {
        store,
        wallet,
        user_id: user.id,
    }
}

fn router(store: &Arc<MemoryStore>) -> axum::Router {
    let auth = StubAuth::default()
        .with(TOKEN, "auth-alice")
        .with("token-bob", "auth-bob")
        .with("token-ghost", "auth-without-profile");
    app(store.clone(), auth, Arc::new(StubPrices::default()))
}

fn body(wallet_id: Uuid, amount: f64) -> Value {
    json!({
        "walletId": wallet_id,
        "symbol": "BTC",
        "amount": amount,
        "destinationAddress": "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh",
        "network": "bitcoin",
        "email": "alice@example.com",
    })
}

fn close(value: &Value, expected: f64) -> bool {
    value.as_f64().map(|v| (v - expected).abs() < 1e-9).unwrap_or(false)
}

#[tokio::test]
async fn test_valid_withdrawal_is_created_pending() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["success"], json!(true));
    assert_eq!(response["data"]["status"], json!("pending"));
    assert!(close(&response["data"]["amount"], 1.0));
    assert!(close(&response["data"]["amountUsd"], 42500.0));
    assert!(close(&response["data"]["fee"], 0.01));

    let id: Uuid = serde_json::from_value(response["data"]["id"].clone()).unwrap();
    let saved = f.store.get_withdrawal_request(id).await.unwrap().unwrap();
    assert_eq!(saved.status, WithdrawalStatus::Pending);
    assert_eq!(saved.amount, dec!(1.0));
    assert_eq!(saved.fee_amount, dec!(0.01));
    assert_eq!(saved.amount_usd, dec!(42500));
    assert_eq!(saved.user_id, f.user_id);

    let audits = f.store.all_audit_logs().await;
    assert!(audits
        .iter()
        .any(|a| a.action == AuditAction::WithdrawalRequested && a.entity_id == id));

    let (status, fetched) = call(&app, get(&format!("/api/withdrawals/{}", id), Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["status"], json!("pending"));
}

#[tokio::test]
async fn test_balance_below_amount_reports_available() {
    let f = fixture(dec!(0.5)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = response["error"].as_str().unwrap();
    assert!(error.contains("Insufficient balance"));
    assert!(error.contains("0.5"));
    assert!(!error.contains("fees"));
    assert_eq!(f.store.withdrawal_count().await, 0);
}

#[tokio::test]
async fn test_balance_not_covering_fee_has_distinct_message() {
    let f = fixture(dec!(1.005)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = response["error"].as_str().unwrap();
    assert!(error.contains("including fees"));
    assert!(error.contains("1.01"));
}

#[tokio::test]
async fn test_foreign_and_missing_wallets_look_the_same() {
    let f = fixture(dec!(1.5)).await;
    let bob = f.store.add_user("auth-bob", "bob@example.com").await;
    let bobs_wallet = f.store.add_wallet(bob.id, "0x2222222222222222222222222222222222222222").await;
    f.store.add_asset(&bobs_wallet, "BTC", dec!(10), Some(dec!(42500))).await;
    let app = router(&f.store);

    let foreign = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(bobs_wallet.id, 1.0))).await;
    let missing = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(Uuid::new_v4(), 1.0))).await;

    assert_eq!(foreign.0, StatusCode::FORBIDDEN);
    assert_eq!(foreign, missing);
    assert_eq!(foreign.1["success"], json!(false));
}

#[tokio::test]
async fn test_unauthenticated_request_creates_nothing() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", None, &body(f.wallet.id, 1.0))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["success"], json!(false));

    let (status, _) = call(&app, post_json("/api/withdraw", Some("forged"), &body(f.wallet.id, 1.0))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(f.store.withdrawal_count().await, 0);
}

#[tokio::test]
async fn test_auth_runs_before_validation() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (status, _) = call(&app, post_json("/api/withdraw", None, &json!({ "garbage": true }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &json!({ "garbage": true }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], json!(false));
}

#[tokio::test]
async fn test_user_without_profile_is_not_found() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", Some("token-ghost"), &body(f.wallet.id, 1.0))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], json!("User not found"));
}

#[tokio::test]
async fn test_store_failure_is_generic_server_error() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);
    f.store.set_failing(true);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["error"], json!("Internal server error"));
}

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_overdraw() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (a, b) = tokio::join!(
        call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))),
        call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))),
    );

    let mut statuses = vec![a.0.as_u16(), b.0.as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 400]);
    assert_eq!(f.store.withdrawal_count().await, 1);
}

#[tokio::test]
async fn test_withdrawals_are_listed_per_user() {
    let f = fixture(dec!(5)).await;
    let app = router(&f.store);

    for amount in [1.0, 2.0] {
        let (status, _) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, amount))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, mine) = call(&app, get("/api/withdrawals", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 2);

    f.store.add_user("auth-bob", "bob@example.com").await;
    let (_, theirs) = call(&app, get("/api/withdrawals", Some("token-bob"))).await;
    assert!(theirs["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_withdrawal_audit_entries_share_entity_type() {
    let f = fixture(dec!(1.5)).await;
    let app = router(&f.store);

    let (status, response) = call(&app, post_json("/api/withdraw", Some(TOKEN), &body(f.wallet.id, 1.0))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id: Uuid = serde_json::from_value(response["data"]["id"].clone()).unwrap();

    f.store
        .update_withdrawal_status(id, WithdrawalStatus::Completed, Some("0xabc"))
        .await
        .unwrap();

    let audits: Vec<_> = f
        .store
        .all_audit_logs()
        .await
        .into_iter()
        .filter(|a| a.entity_id == id)
        .collect();
    assert_eq!(audits.len(), 2);
    assert!(audits.iter().all(|a| a.entity_type == "withdrawal_requests"));
}
