pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;

use crate::config::PublicConfig;
use crate::database::PortfolioStore;
use crate::services::auth_service::{authenticate, AuthProvider};
use crate::services::dashboard_service::DashboardService;
use crate::services::price_service::{PriceService, PriceSource};
use crate::services::withdrawal_service::WithdrawalService;
use crate::types::User;
use axum::http::HeaderMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn PortfolioStore>,
    pub prices: Arc<dyn PriceSource>,
    pub auth: Arc<dyn AuthProvider>,
    pub public_config: PublicConfig,
    pub cron_api_key: Arc<str>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        prices: Arc<dyn PriceSource>,
        auth: Arc<dyn AuthProvider>,
        public_config: PublicConfig,
        cron_api_key: &str,
    ) -> Self {
        Self {
            store,
            prices,
            auth,
            public_config,
            cron_api_key: Arc::from(cron_api_key),
        }
    }

    pub fn withdrawals(&self) -> WithdrawalService {
        WithdrawalService::new(self.store.clone(), self.auth.clone())
    }

    pub fn price_service(&self) -> PriceService {
        PriceService::new(self.store.clone(), self.prices.clone())
    }

    pub fn dashboard(&self) -> DashboardService {
        DashboardService::new(self.store.clone(), self.prices.clone())
    }

    /// Resolves the bearer token to the caller's profile.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let identity = authenticate(self.auth.as_ref(), headers).await?;

        self.store
            .find_user_by_auth_id(&identity.id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}
