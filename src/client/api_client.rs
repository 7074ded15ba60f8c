use super::session::ClientSession;
use super::wallet_connect::WalletApi;
use super::withdraw_review::WithdrawalApi;
use crate::error::ClientError;
use crate::services::price_service::PriceSource;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

/// Typed client for the cryptofolio HTTP API.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Option<Arc<ClientSession>>,
}

/// Envelope of `GET /api/prices`.
#[derive(Debug, Deserialize)]
struct PricesEnvelope {
    success: bool,
    #[serde(default)]
    data: HashMap<String, PriceQuote>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    /// Attaches a signed-in session; authenticated calls send its bearer token.
    pub fn with_session(mut self, session: Arc<ClientSession>) -> Self {
        self.session = Some(session);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        match &self.session {
            Some(session) => Ok(request.bearer_auth(session.access_token().await?)),
            None => Ok(request),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body: ApiResponse<T> = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("request failed").to_string(),
                })
            }
        };

        match body.data {
            Some(data) if status.is_success() && body.success => Ok(data),
            _ => Err(ClientError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "request failed".to_string()),
            }),
        }
    }

    pub async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, PriceQuote>, ClientError> {
        let response = self
            .http
            .get(self.url("/api/prices"))
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await?;
        let status = response.status();
        let body: PricesEnvelope = response.json().await?;

        if !status.is_success() || !body.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "request failed".to_string()),
            });
        }
        Ok(body.data)
    }

    pub async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ClientError> {
        self.send(self.http.get(self.url(&format!("/api/prices/{}", symbol))))
            .await
    }

    pub async fn get_coin_details(&self, symbol: &str) -> Result<PriceQuote, ClientError> {
        self.send(self.http.get(self.url(&format!("/api/prices/{}/details", symbol))))
            .await
    }

    pub async fn create_withdrawal(&self, body: &WithdrawBody) -> Result<WithdrawalReceipt, ClientError> {
        let request = self.authorized(self.http.post(self.url("/api/withdraw")).json(body)).await?;
        self.send(request).await
    }

    pub async fn list_withdrawals(&self) -> Result<Vec<WithdrawalRequest>, ClientError> {
        let request = self.authorized(self.http.get(self.url("/api/withdrawals"))).await?;
        self.send(request).await
    }

    pub async fn get_withdrawal(&self, id: Uuid) -> Result<WithdrawalRequest, ClientError> {
        let request = self
            .authorized(self.http.get(self.url(&format!("/api/withdrawals/{}", id))))
            .await?;
        self.send(request).await
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, ClientError> {
        let request = self.authorized(self.http.get(self.url("/api/wallets"))).await?;
        self.send(request).await
    }

    pub async fn verify_wallet(&self, body: &WalletVerifyBody) -> Result<Wallet, ClientError> {
        let request = self
            .authorized(self.http.post(self.url("/api/wallets/verify")).json(body))
            .await?;
        self.send(request).await
    }

    pub async fn disconnect_wallet(&self, wallet_id: Uuid) -> Result<Wallet, ClientError> {
        let request = self
            .authorized(self.http.post(self.url(&format!("/api/wallets/{}/disconnect", wallet_id))))
            .await?;
        self.send(request).await
    }

    pub async fn get_dashboard(&self) -> Result<DashboardView, ClientError> {
        let request = self.authorized(self.http.get(self.url("/api/dashboard"))).await?;
        self.send(request).await
    }
}

#[async_trait]
impl WithdrawalApi for ApiClient {
    async fn submit_withdrawal(&self, body: &WithdrawBody) -> Result<WithdrawalReceipt, ClientError> {
        self.create_withdrawal(body).await
    }
}

#[async_trait]
impl WalletApi for ApiClient {
    fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    async fn register_wallet(&self, body: &WalletVerifyBody) -> Result<Wallet, ClientError> {
        self.verify_wallet(body).await
    }
}

/// Prices read through the API, so the client never talks to the price
/// provider directly.
#[async_trait]
impl PriceSource for ApiClient {
    async fn get_price(&self, symbol: &str) -> Option<PriceQuote> {
        match ApiClient::get_price(self, symbol).await {
            Ok(quote) => Some(quote),
            Err(ClientError::Api { status: 404, .. }) => {
                debug!("No price for {}", symbol);
                None
            }
            Err(e) => {
                error!("❌ Price lookup for {} failed: {}", symbol, e);
                None
            }
        }
    }

    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        ApiClient::get_prices(self, symbols).await.unwrap_or_else(|e| {
            error!("❌ Batch price lookup failed: {}", e);
            HashMap::new()
        })
    }

    async fn get_coin_details(&self, symbol: &str) -> Option<PriceQuote> {
        ApiClient::get_coin_details(self, symbol).await.ok()
    }
}
