use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{
    AlertType, Asset, PortfolioChange, PortfolioValue, PriceQuote, Transaction, WithdrawalStatus,
};

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Body of `POST /api/withdraw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawBody {
    pub wallet_id: String,
    pub symbol: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub destination_address: String,
    pub network: String,
    pub email: String,
}

/// `data` of a successful withdrawal commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
    pub id: Uuid,
    pub status: WithdrawalStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_usd: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceUpdateBody {
    pub symbols: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdateSummary {
    pub updated: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletVerifyBody {
    pub address: String,
    pub signature: String,
    pub message: String,
    pub wallet_type: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertBody {
    pub symbol: String,
    pub alert_type: AlertType,
    pub target_price: Decimal,
}

/// Everything the dashboard renders, assembled in one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub portfolio_value: PortfolioValue,
    pub portfolio_change: PortfolioChange,
    pub assets: Vec<Asset>,
    pub transactions: Vec<Transaction>,
    pub prices: BTreeMap<String, PriceQuote>,
    pub refreshed_at: DateTime<Utc>,
}
