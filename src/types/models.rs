use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` for a closed string-backed enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Send,
    Receive,
    Swap,
}

string_enum!(TxType { Send => "send", Receive => "receive", Swap => "swap" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

string_enum!(TxStatus { Pending => "pending", Confirmed => "confirmed", Failed => "failed" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

string_enum!(WithdrawalStatus { Pending => "pending", Completed => "completed", Failed => "failed" });

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            WithdrawalStatus::Pending => false,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed => true,
        }
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        match (self, next) {
            (WithdrawalStatus::Pending, WithdrawalStatus::Completed)
            | (WithdrawalStatus::Pending, WithdrawalStatus::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Above,
    Below,
}

string_enum!(AlertType { Above => "above", Below => "below" });

impl AlertType {
    pub fn is_triggered(&self, target: Decimal, price: Decimal) -> bool {
        match self {
            AlertType::Above => price >= target,
            AlertType::Below => price <= target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Locked,
}

string_enum!(AccountStatus { Active => "active", Locked => "locked" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    WithdrawalRequested,
    WithdrawalStatusChanged,
    WalletConnected,
    WalletDisconnected,
}

string_enum!(AuditAction {
    WithdrawalRequested => "WITHDRAWAL_REQUESTED",
    WithdrawalStatusChanged => "WITHDRAWAL_STATUS_CHANGED",
    WalletConnected => "WALLET_CONNECTED",
    WalletDisconnected => "WALLET_DISCONNECTED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub auth_id: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub is_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub wallet_type: String,
    pub label: Option<String>,
    pub is_primary: bool,
    pub is_active: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub wallet_type: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub balance: Decimal,
    pub balance_usd: Decimal,
    pub price_usd: Option<Decimal>,
    pub last_synced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TxType,
    pub symbol: String,
    pub amount: Decimal,
    pub amount_usd: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub symbol: String,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub destination_address: String,
    pub network: String,
    pub fee_amount: Decimal,
    pub fee_usd: Decimal,
    pub status: WithdrawalStatus,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub symbol: String,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub destination_address: String,
    pub network: String,
    pub fee_amount: Decimal,
    pub fee_usd: Decimal,
}

impl NewWithdrawal {
    pub fn total_required(&self) -> Decimal {
        self.amount + self.fee_amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub symbol: String,
    pub price_usd: Decimal,
    pub price_change_24h: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceHistory {
    pub symbol: String,
    pub price_usd: Decimal,
    pub price_change_24h: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub alert_type: AlertType,
    pub target_price: Decimal,
    pub is_active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceAlert {
    pub user_id: Uuid,
    pub symbol: String,
    pub alert_type: AlertType,
    pub target_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditLog {
    pub user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub snapshot_date: DateTime<Utc>,
    pub total_value_usd: Decimal,
    pub total_value_btc: Option<Decimal>,
    pub total_value_eth: Option<Decimal>,
    pub assets_count: i32,
    pub allocation_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPortfolioSnapshot {
    pub user_id: Uuid,
    pub total_value_usd: Decimal,
    pub total_value_btc: Option<Decimal>,
    pub total_value_eth: Option<Decimal>,
    pub assets_count: i32,
    pub allocation_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValue {
    pub total_value_usd: Decimal,
    pub assets_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioChange {
    pub current_value_usd: Decimal,
    pub previous_value_usd: Decimal,
    pub change_usd: Decimal,
    pub change_percentage: Decimal,
}

impl PortfolioChange {
    pub fn between(previous_value_usd: Decimal, current_value_usd: Decimal) -> Self {
        let change_usd = current_value_usd - previous_value_usd;
        let change_percentage = if previous_value_usd.is_zero() {
            Decimal::ZERO
        } else {
            (change_usd / previous_value_usd * Decimal::ONE_HUNDRED).round_dp(4)
        };

        Self {
            current_value_usd,
            previous_value_usd,
            change_usd,
            change_percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub symbol: String,
    pub value_usd: Decimal,
    pub percentage: Decimal,
}

/// Splits a set of (symbol, value) pairs into percentage shares of the total.
pub fn allocation_from_values(values: Vec<(String, Decimal)>) -> Vec<AllocationEntry> {
    let total: Decimal = values.iter().map(|(_, v)| *v).sum();
    let mut entries: Vec<AllocationEntry> = values
        .into_iter()
        .map(|(symbol, value_usd)| AllocationEntry {
            percentage: if total.is_zero() {
                Decimal::ZERO
            } else {
                (value_usd / total * Decimal::ONE_HUNDRED).round_dp(2)
            },
            symbol,
            value_usd,
        })
        .collect();
    entries.sort_by(|a, b| b.value_usd.cmp(&a.value_usd));
    entries
}
