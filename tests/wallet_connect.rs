mod common;

use axum::http::StatusCode;
use common::*;
use cryptofolio::client::wallet_connect::{LocalKeyProvider, MemoryCache, WalletProvider};
use cryptofolio::client::{ApiClient, ClientSession, ConnectionState, WalletConnector};
use cryptofolio::error::WalletError;
use cryptofolio::services::wallet_service::{challenge_message, format_address};
use cryptofolio::{AuditAction, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const OTHER_KEY: &str = "0123456789012345678901234567890123456789012345678901234567890123";
const TOKEN: &str = "token-alice";

async fn setup() -> (Arc<MemoryStore>, axum::Router) {
    let store = Arc::new(MemoryStore::new());
    store.add_user("auth-alice", "alice@example.com").await;
    let auth = StubAuth::default().with(TOKEN, "auth-alice");
    let router = app(store.clone(), auth, Arc::new(StubPrices::default()));
    (store, router)
}

fn signed_in_client(base_url: &str) -> ApiClient {
    let session = ClientSession::new(
        Arc::new(StubAuth::default()),
        Some(session_for(TOKEN, "auth-alice")),
    );
    ApiClient::new(base_url, Duration::from_secs(5))
        .unwrap()
        .with_session(Arc::new(session))
}

#[tokio::test]
async fn test_verify_and_save_wallet_end_to_end() {
    let (store, router) = setup().await;
    let base_url = serve(router).await;
    let client = signed_in_client(&base_url);

    let provider = Arc::new(LocalKeyProvider::from_private_key(KEY).unwrap());
    let cache = Arc::new(MemoryCache::new());
    let mut connector = WalletConnector::new(provider.clone(), cache);

    assert!(matches!(
        connector.verify_and_save_wallet(&client, None).await,
        Err(WalletError::NotConnected)
    ));

    connector.connect().await;
    assert!(matches!(connector.state(), ConnectionState::Connected { .. }));

    let wallet = connector
        .verify_and_save_wallet(&client, Some("Main".to_string()))
        .await
        .unwrap();
    assert_eq!(wallet.address, format_address(&provider.address()));
    assert!(wallet.is_primary);
    assert_eq!(connector.wallet_id(), Some(wallet.id));

    let again = connector.verify_and_save_wallet(&client, None).await.unwrap();
    assert_eq!(again.id, wallet.id);

    let wallets = client.list_wallets().await.unwrap();
    assert_eq!(wallets.len(), 1);

    let audits = store.all_audit_logs().await;
    assert_eq!(
        audits.iter().filter(|a| a.action == AuditAction::WalletConnected).count(),
        1
    );

    let disconnected = client.disconnect_wallet(wallet.id).await.unwrap();
    assert!(!disconnected.is_active);
    assert!(client.list_wallets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_verification_requires_a_session() {
    let (_, router) = setup().await;
    let base_url = serve(router).await;
    let anonymous = ApiClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let provider = Arc::new(LocalKeyProvider::from_private_key(KEY).unwrap());
    let mut connector = WalletConnector::new(provider, Arc::new(MemoryCache::new()));
    connector.connect().await;

    assert!(matches!(
        connector.verify_and_save_wallet(&anonymous, None).await,
        Err(WalletError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_server_rejects_signature_from_another_key() {
    let (store, router) = setup().await;

    let owner = LocalKeyProvider::from_private_key(KEY).unwrap();
    let other = LocalKeyProvider::from_private_key(OTHER_KEY).unwrap();
    let address = format_address(&owner.address());
    let message = challenge_message(&address, chrono::Utc::now());
    let signature = other.sign_message(&message).await.unwrap();

    let (status, body) = call(
        &router,
        post_json(
            "/api/wallets/verify",
            Some(TOKEN),
            &json!({ "address": address, "message": message, "signature": signature }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(store.all_audit_logs().await.is_empty());
}

#[tokio::test]
async fn test_disconnecting_primary_promotes_next_wallet() {
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user("auth-bob", "bob@example.com").await;
    let first = store.add_wallet(user.id, "0x1111111111111111111111111111111111111111").await;
    let second = store.add_wallet(user.id, "0x2222222222222222222222222222222222222222").await;
    assert!(first.is_primary && !second.is_primary);

    let auth = StubAuth::default().with("token-bob", "auth-bob");
    let router = app(store.clone(), auth, Arc::new(StubPrices::default()));

    let (status, _) = call(
        &router,
        post_json(&format!("/api/wallets/{}/disconnect", first.id), Some("token-bob"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, wallets) = call(&router, get("/api/wallets", Some("token-bob"))).await;
    let wallets = wallets["data"].as_array().unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0]["id"], json!(second.id));
    assert_eq!(wallets[0]["is_primary"], json!(true));
}
