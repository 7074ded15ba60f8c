use crate::database::operations::WITHDRAWAL_ENTITY;
use crate::database::PortfolioStore;
use crate::error::{PersistenceError, WithdrawError};
use crate::services::auth_service::{authenticate, AuthProvider};
use crate::types::{AuditAction, NewAuditLog, NewWithdrawal, WithdrawalReceipt};
use axum::http::HeaderMap;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const FEE_RATE: Decimal = dec!(0.01);
pub const MIN_FEE: Decimal = dec!(0.0001);
const MAX_SYMBOL_LEN: usize = 20;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

/// `max(amount * 1%, 0.0001)`
pub fn withdrawal_fee(amount: Decimal) -> Decimal {
    (amount * FEE_RATE).max(MIN_FEE)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWithdrawBody {
    wallet_id: Option<String>,
    symbol: Option<String>,
    amount: Option<serde_json::Number>,
    destination_address: Option<String>,
    network: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidWithdrawal {
    pub wallet_id: Uuid,
    pub symbol: String,
    pub amount: Decimal,
    pub destination_address: String,
    pub network: String,
    pub email: String,
}

fn required(value: Option<String>, field: &str) -> Result<String, WithdrawError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WithdrawError::Validation(format!("{} is required", field))),
    }
}

/// Parses and validates a withdrawal body. Rejects unknown shapes outright.
pub fn validate_body(body: &[u8]) -> Result<ValidWithdrawal, WithdrawError> {
    let raw: RawWithdrawBody = serde_json::from_slice(body)
        .map_err(|_| WithdrawError::Validation("Invalid request data".to_string()))?;

    let wallet_id = required(raw.wallet_id, "walletId")?;
    let wallet_id = Uuid::parse_str(&wallet_id)
        .map_err(|_| WithdrawError::Validation("Invalid wallet ID".to_string()))?;

    let symbol = required(raw.symbol, "symbol")?;
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(WithdrawError::Validation(format!(
            "symbol must be at most {} characters",
            MAX_SYMBOL_LEN
        )));
    }

    let amount = raw
        .amount
        .and_then(|n| Decimal::from_str(&n.to_string()).ok())
        .ok_or_else(|| WithdrawError::Validation("amount must be a number".to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(WithdrawError::Validation("Amount must be positive".to_string()));
    }

    let destination_address = required(raw.destination_address, "destinationAddress")?;
    let network = required(raw.network, "network")?;

    let email = required(raw.email, "email")?;
    if !EMAIL_RE.is_match(&email) {
        return Err(WithdrawError::Validation("Invalid email".to_string()));
    }

    Ok(ValidWithdrawal {
        wallet_id,
        symbol: symbol.to_uppercase(),
        amount,
        destination_address,
        network,
        email,
    })
}

/// Server side of a withdrawal: re-validates everything the client computed
/// and records a pending request.
pub struct WithdrawalService {
    store: Arc<dyn PortfolioStore>,
    auth: Arc<dyn AuthProvider>,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn PortfolioStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// Runs auth, validation, ownership, balance, fee and persistence in that
    /// order. The first failing step decides the outcome.
    pub async fn commit(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<WithdrawalReceipt, WithdrawError> {
        let result = self.run(headers, body).await;
        if let Err(e) = &result {
            match e {
                WithdrawError::Persistence(_) | WithdrawError::Unknown(_) => {
                    error!("❌ Withdrawal failed: {}", e)
                }
                other => warn!("⚠️ Withdrawal rejected: {}", other),
            }
        }
        result
    }

    async fn run(&self, headers: &HeaderMap, body: &[u8]) -> Result<WithdrawalReceipt, WithdrawError> {
        let identity = authenticate(self.auth.as_ref(), headers).await?;

        let request = validate_body(body)?;

        let user = self
            .store
            .find_user_by_auth_id(&identity.id)
            .await?
            .ok_or_else(|| WithdrawError::NotFound("User not found".to_string()))?;

        let wallet = self
            .store
            .find_owned_wallet(request.wallet_id, user.id)
            .await?
            .ok_or(WithdrawError::Ownership)?;

        let asset = self
            .store
            .find_wallet_asset(wallet.id, &request.symbol)
            .await?
            .ok_or_else(|| WithdrawError::AssetNotHeld {
                symbol: request.symbol.clone(),
            })?;

        if asset.balance < request.amount {
            return Err(WithdrawError::InsufficientBalance {
                symbol: request.symbol,
                available: asset.balance,
            });
        }

        let fee = withdrawal_fee(request.amount);
        let total_required = request.amount + fee;
        if asset.balance < total_required {
            return Err(WithdrawError::InsufficientBalanceIncludingFee {
                symbol: request.symbol,
                required: total_required,
            });
        }

        let price = asset.price_usd.unwrap_or_default();
        let withdrawal = NewWithdrawal {
            id: Uuid::new_v4(),
            user_id: user.id,
            wallet_id: wallet.id,
            symbol: asset.symbol.clone(),
            amount: request.amount,
            amount_usd: request.amount * price,
            destination_address: request.destination_address.clone(),
            network: request.network.clone(),
            fee_amount: fee,
            fee_usd: fee * price,
        };

        let audit = NewAuditLog {
            user_id: user.id,
            action: AuditAction::WithdrawalRequested,
            entity_type: WITHDRAWAL_ENTITY.to_string(),
            entity_id: withdrawal.id,
            old_values: None,
            new_values: Some(json!({
                "symbol": withdrawal.symbol,
                "amount": withdrawal.amount.to_f64(),
                "destination_address": withdrawal.destination_address,
                "network": withdrawal.network,
                "fee_usd": withdrawal.fee_usd.to_f64(),
            })),
        };

        let saved = self
            .store
            .commit_withdrawal(&withdrawal, &audit)
            .await
            .map_err(|e| match e {
                PersistenceError::InsufficientFunds { available, .. } => {
                    WithdrawError::BalanceReserved {
                        symbol: withdrawal.symbol.clone(),
                        available: available.max(Decimal::ZERO),
                    }
                }
                PersistenceError::NotFound { .. } => WithdrawError::AssetNotHeld {
                    symbol: withdrawal.symbol.clone(),
                },
                other => WithdrawError::Persistence(other),
            })?;

        info!(
            "💸 Withdrawal {} requested: {} {} to {} ({})",
            saved.id, saved.amount, saved.symbol, saved.destination_address, saved.network
        );

        Ok(WithdrawalReceipt {
            id: saved.id,
            status: saved.status,
            amount: saved.amount,
            amount_usd: saved.amount_usd,
            fee: saved.fee_amount,
        })
    }
}
