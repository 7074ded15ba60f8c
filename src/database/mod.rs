pub mod memory;
pub mod operations;
pub mod utils;

use crate::error::PersistenceError;
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use operations::*;

/// Typed access to everything the service persists.
///
/// Reads that can legitimately find nothing return `Ok(None)`; any other
/// failure is an `Err`.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn health_check(&self) -> Result<(), PersistenceError>;

    // users
    async fn find_user_by_auth_id(&self, auth_id: &str) -> Result<Option<User>, PersistenceError>;
    async fn create_user_profile(&self, auth_id: &str, email: &str) -> Result<User, PersistenceError>;

    // wallets
    async fn get_user_wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, PersistenceError>;
    async fn get_primary_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, PersistenceError>;
    async fn find_owned_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, PersistenceError>;
    async fn register_wallet(
        &self,
        wallet: &NewWallet,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError>;
    async fn disconnect_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError>;

    // assets
    async fn get_user_assets(&self, user_id: Uuid) -> Result<Vec<Asset>, PersistenceError>;
    async fn get_wallet_assets(&self, wallet_id: Uuid) -> Result<Vec<Asset>, PersistenceError>;
    async fn find_wallet_asset(
        &self,
        wallet_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Asset>, PersistenceError>;
    async fn update_asset_balance(
        &self,
        asset_id: Uuid,
        balance: Decimal,
    ) -> Result<Asset, PersistenceError>;

    // transactions
    async fn get_transaction_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, PersistenceError>;
    async fn get_transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError>;

    // withdrawals
    /// Persists a pending withdrawal together with its audit entry. Fails with
    /// `InsufficientFunds` when pending withdrawals on the same holding leave
    /// less than `amount + fee` available.
    async fn commit_withdrawal(
        &self,
        withdrawal: &NewWithdrawal,
        audit: &NewAuditLog,
    ) -> Result<WithdrawalRequest, PersistenceError>;
    async fn get_withdrawal_request(
        &self,
        id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, PersistenceError>;
    async fn get_withdrawal_requests(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalRequest>, PersistenceError>;
    async fn update_withdrawal_status(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        tx_hash: Option<&str>,
    ) -> Result<WithdrawalRequest, PersistenceError>;

    // prices
    async fn insert_price_history(
        &self,
        price: &NewPriceHistory,
    ) -> Result<PriceHistory, PersistenceError>;
    async fn get_latest_price(&self, symbol: &str) -> Result<Option<PriceHistory>, PersistenceError>;
    async fn get_price_history(
        &self,
        symbol: &str,
        days_back: i64,
        limit: i64,
    ) -> Result<Vec<PriceHistory>, PersistenceError>;

    // alerts
    async fn create_price_alert(&self, alert: &NewPriceAlert) -> Result<PriceAlert, PersistenceError>;
    async fn get_user_price_alerts(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<PriceAlert>, PersistenceError>;
    async fn delete_price_alert(&self, alert_id: Uuid, user_id: Uuid) -> Result<bool, PersistenceError>;

    // audit
    async fn log_audit_event(&self, entry: &NewAuditLog) -> Result<AuditLog, PersistenceError>;
    async fn get_audit_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<AuditLog>, PersistenceError>;

    // portfolio
    async fn create_portfolio_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshot,
    ) -> Result<PortfolioSnapshot, PersistenceError>;
    async fn get_portfolio_snapshots(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, PersistenceError>;
    async fn portfolio_value(&self, user_id: Uuid) -> Result<PortfolioValue, PersistenceError>;
    async fn portfolio_change_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<PortfolioChange, PersistenceError>;
    async fn portfolio_allocation(&self, user_id: Uuid) -> Result<Vec<AllocationEntry>, PersistenceError>;

    async fn portfolio_24h_change(&self, user_id: Uuid) -> Result<PortfolioChange, PersistenceError> {
        self.portfolio_change_since(user_id, Utc::now() - Duration::hours(24))
            .await
    }

    // maintenance
    async fn update_asset_prices(&self) -> Result<u64, PersistenceError>;
    async fn check_and_trigger_price_alerts(&self) -> Result<u64, PersistenceError>;
    async fn cleanup_expired_sessions(&self) -> Result<u64, PersistenceError>;
    async fn unlock_expired_account_locks(&self) -> Result<u64, PersistenceError>;
    async fn lock_accounts_excessive_attempts(&self) -> Result<u64, PersistenceError>;
    async fn list_users_with_assets(&self) -> Result<Vec<Uuid>, PersistenceError>;
}

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool eagerly so a bad URL or unreachable store fails at startup.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_tables(&self) -> Result<(), PersistenceError> {
        SystemOperations::create_tables(&self.pool).await
    }
}

#[async_trait]
impl PortfolioStore for Database {
    async fn health_check(&self) -> Result<(), PersistenceError> {
        SystemOperations::health_check(&self.pool).await
    }

    async fn find_user_by_auth_id(&self, auth_id: &str) -> Result<Option<User>, PersistenceError> {
        UserOperations::find_by_auth_id(&self.pool, auth_id).await
    }

    async fn create_user_profile(&self, auth_id: &str, email: &str) -> Result<User, PersistenceError> {
        UserOperations::create_profile(&self.pool, auth_id, email).await
    }

    async fn get_user_wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, PersistenceError> {
        WalletOperations::get_user_wallets(&self.pool, user_id).await
    }

    async fn get_primary_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, PersistenceError> {
        WalletOperations::get_primary_wallet(&self.pool, user_id).await
    }

    async fn find_owned_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, PersistenceError> {
        WalletOperations::find_owned(&self.pool, wallet_id, user_id).await
    }

    async fn register_wallet(
        &self,
        wallet: &NewWallet,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        WalletOperations::register(&self.pool, wallet, audit).await
    }

    async fn disconnect_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        WalletOperations::disconnect(&self.pool, wallet_id, user_id, audit).await
    }

    async fn get_user_assets(&self, user_id: Uuid) -> Result<Vec<Asset>, PersistenceError> {
        AssetOperations::get_user_assets(&self.pool, user_id).await
    }

    async fn get_wallet_assets(&self, wallet_id: Uuid) -> Result<Vec<Asset>, PersistenceError> {
        AssetOperations::get_wallet_assets(&self.pool, wallet_id).await
    }

    async fn find_wallet_asset(
        &self,
        wallet_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Asset>, PersistenceError> {
        AssetOperations::find_wallet_asset(&self.pool, wallet_id, symbol).await
    }

    async fn update_asset_balance(
        &self,
        asset_id: Uuid,
        balance: Decimal,
    ) -> Result<Asset, PersistenceError> {
        AssetOperations::update_balance(&self.pool, asset_id, balance).await
    }

    async fn get_transaction_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        TransactionOperations::get_history(&self.pool, user_id, limit, offset).await
    }

    async fn get_transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError> {
        TransactionOperations::get_by_hash(&self.pool, tx_hash).await
    }

    async fn commit_withdrawal(
        &self,
        withdrawal: &NewWithdrawal,
        audit: &NewAuditLog,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        WithdrawalOperations::commit(&self.pool, withdrawal, audit).await
    }

    async fn get_withdrawal_request(
        &self,
        id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, PersistenceError> {
        WithdrawalOperations::get_request(&self.pool, id).await
    }

    async fn get_withdrawal_requests(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalRequest>, PersistenceError> {
        WithdrawalOperations::get_requests(&self.pool, user_id, limit).await
    }

    async fn update_withdrawal_status(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        tx_hash: Option<&str>,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        WithdrawalOperations::update_status(&self.pool, id, status, tx_hash).await
    }

    async fn insert_price_history(
        &self,
        price: &NewPriceHistory,
    ) -> Result<PriceHistory, PersistenceError> {
        PriceOperations::insert_price_history(&self.pool, price).await
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<Option<PriceHistory>, PersistenceError> {
        PriceOperations::get_latest_price(&self.pool, symbol).await
    }

    async fn get_price_history(
        &self,
        symbol: &str,
        days_back: i64,
        limit: i64,
    ) -> Result<Vec<PriceHistory>, PersistenceError> {
        PriceOperations::get_price_history(&self.pool, symbol, days_back, limit).await
    }

    async fn create_price_alert(&self, alert: &NewPriceAlert) -> Result<PriceAlert, PersistenceError> {
        AlertOperations::create(&self.pool, alert).await
    }

    async fn get_user_price_alerts(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<PriceAlert>, PersistenceError> {
        AlertOperations::get_user_alerts(&self.pool, user_id, active_only).await
    }

    async fn delete_price_alert(&self, alert_id: Uuid, user_id: Uuid) -> Result<bool, PersistenceError> {
        AlertOperations::delete(&self.pool, alert_id, user_id).await
    }

    async fn log_audit_event(&self, entry: &NewAuditLog) -> Result<AuditLog, PersistenceError> {
        AuditOperations::log_event(&self.pool, entry).await
    }

    async fn get_audit_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<AuditLog>, PersistenceError> {
        AuditOperations::get_logs(&self.pool, user_id, limit).await
    }

    async fn create_portfolio_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshot,
    ) -> Result<PortfolioSnapshot, PersistenceError> {
        PortfolioOperations::create_snapshot(&self.pool, snapshot).await
    }

    async fn get_portfolio_snapshots(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, PersistenceError> {
        PortfolioOperations::get_snapshots(&self.pool, user_id, limit).await
    }

    async fn portfolio_value(&self, user_id: Uuid) -> Result<PortfolioValue, PersistenceError> {
        PortfolioOperations::total_value(&self.pool, user_id).await
    }

    async fn portfolio_change_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<PortfolioChange, PersistenceError> {
        PortfolioOperations::change_since(&self.pool, user_id, since).await
    }

    async fn portfolio_allocation(&self, user_id: Uuid) -> Result<Vec<AllocationEntry>, PersistenceError> {
        PortfolioOperations::allocation(&self.pool, user_id).await
    }

    async fn update_asset_prices(&self) -> Result<u64, PersistenceError> {
        MaintenanceOperations::update_asset_prices(&self.pool).await
    }

    async fn check_and_trigger_price_alerts(&self) -> Result<u64, PersistenceError> {
        AlertOperations::check_and_trigger(&self.pool).await
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, PersistenceError> {
        MaintenanceOperations::cleanup_expired_sessions(&self.pool).await
    }

    async fn unlock_expired_account_locks(&self) -> Result<u64, PersistenceError> {
        MaintenanceOperations::unlock_expired_account_locks(&self.pool).await
    }

    async fn lock_accounts_excessive_attempts(&self) -> Result<u64, PersistenceError> {
        MaintenanceOperations::lock_accounts_excessive_attempts(&self.pool).await
    }

    async fn list_users_with_assets(&self) -> Result<Vec<Uuid>, PersistenceError> {
        MaintenanceOperations::users_with_assets(&self.pool).await
    }
}
