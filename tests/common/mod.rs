#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cryptofolio::{
    api::{create_router, ApiState},
    config::PublicConfig,
    error::AuthError,
    services::{
        auth_service::{AuthIdentity, AuthProvider, Session},
        price_service::PriceSource,
    },
    MemoryStore, PriceQuote,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const CRON_KEY: &str = "cron-secret";

/// Maps bearer tokens to auth ids.
#[derive(Default)]
pub struct StubAuth {
    tokens: HashMap<String, String>,
}

impl StubAuth {
    pub fn with(mut self, token: &str, auth_id: &str) -> Self {
        self.tokens.insert(token.to_string(), auth_id.to_string());
        self
    }
}

#[async_trait]
impl AuthProvider for StubAuth {
    async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AuthError> {
        self.tokens
            .get(token)
            .map(|id| AuthIdentity {
                id: id.clone(),
                email: None,
            })
            .ok_or(AuthError::InvalidToken)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session, AuthError> {
        Err(AuthError::InvalidToken)
    }
}

#[derive(Default)]
pub struct StubPrices {
    quotes: HashMap<String, PriceQuote>,
}

impl StubPrices {
    pub fn with(mut self, symbol: &str, price_usd: f64) -> Self {
        self.quotes.insert(symbol.to_string(), quote(symbol, price_usd));
        self
    }
}

#[async_trait]
impl PriceSource for StubPrices {
    async fn get_price(&self, symbol: &str) -> Option<PriceQuote> {
        self.quotes.get(&symbol.to_uppercase()).cloned()
    }

    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        symbols
            .iter()
            .filter_map(|s| self.quotes.get(&s.to_uppercase()).map(|q| (s.to_uppercase(), q.clone())))
            .collect()
    }

    async fn get_coin_details(&self, symbol: &str) -> Option<PriceQuote> {
        self.get_price(symbol).await
    }
}

pub fn quote(symbol: &str, price_usd: f64) -> PriceQuote {
    PriceQuote {
        id: symbol.to_lowercase(),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        price_usd,
        price_change_24h: 0.0,
        market_cap: 0.0,
        volume_24h: 0.0,
        circulating_supply: 0.0,
    }
}

pub fn public_config() -> PublicConfig {
    PublicConfig {
        supabase_url: "https://demo.supabase.co".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        price_api_url: "https://api.coingecko.com/api/v3".to_string(),
        wallet_connect_project_id: Some("wc-project".to_string()),
    }
}

pub fn state(store: Arc<MemoryStore>, auth: StubAuth, prices: Arc<dyn PriceSource>) -> ApiState {
    ApiState::new(store, prices, Arc::new(auth), public_config(), CRON_KEY)
}

pub fn app(store: Arc<MemoryStore>, auth: StubAuth, prices: Arc<dyn PriceSource>) -> Router {
    create_router(state(store, auth, prices))
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_cron(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

/// Sends one request and returns the status and the JSON body.
pub async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

pub fn session_for(token: &str, auth_id: &str) -> Session {
    Session {
        access_token: token.to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        user: AuthIdentity {
            id: auth_id.to_string(),
            email: None,
        },
    }
}
