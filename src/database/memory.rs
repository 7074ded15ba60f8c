use super::PortfolioStore;
use crate::database::operations::{ACCOUNT_LOCK_MINUTES, MAX_FAILED_LOGIN_ATTEMPTS, WITHDRAWAL_ENTITY};
use crate::error::PersistenceError;
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    sessions: Vec<(Uuid, DateTime<Utc>)>,
    wallets: Vec<Wallet>,
    assets: Vec<Asset>,
    transactions: Vec<Transaction>,
    withdrawals: Vec<WithdrawalRequest>,
    prices: Vec<PriceHistory>,
    alerts: Vec<PriceAlert>,
    audit_logs: Vec<AuditLog>,
    snapshots: Vec<PortfolioSnapshot>,
}

impl MemoryState {
    fn latest_price_at(&self, symbol: &str, at: DateTime<Utc>) -> Option<&PriceHistory> {
        self.prices
            .iter()
            .filter(|p| p.symbol == symbol && p.timestamp <= at)
            .max_by_key(|p| p.timestamp)
    }

    fn latest_price(&self, symbol: &str) -> Option<&PriceHistory> {
        self.prices
            .iter()
            .filter(|p| p.symbol == symbol)
            .max_by_key(|p| p.timestamp)
    }

    fn push_audit(&mut self, entry: &NewAuditLog) -> AuditLog {
        let log = AuditLog {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id,
            old_values: entry.old_values.clone(),
            new_values: entry.new_values.clone(),
            created_at: Utc::now(),
        };
        self.audit_logs.push(log.clone());
        log
    }

    fn held_assets(&self, user_id: Uuid) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(move |a| a.user_id == user_id && a.balance > Decimal::ZERO)
    }
}

/// In-process [`PortfolioStore`] with the same semantics as the Postgres one.
/// Every call holds a single lock, so multi-step writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every store call fails with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend(
                "connection refused (injected)".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn add_user(&self, auth_id: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            auth_id: auth_id.to_string(),
            email: email.to_string(),
            account_status: AccountStatus::Active,
            is_verified: true,
            failed_login_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.users.push(user.clone());
        user
    }

    pub async fn add_wallet(&self, user_id: Uuid, address: &str) -> Wallet {
        let mut state = self.state.lock().await;
        let is_primary = !state
            .wallets
            .iter()
            .any(|w| w.user_id == user_id && w.is_primary && w.is_active);
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id,
            address: address.to_string(),
            wallet_type: "metamask".to_string(),
            label: None,
            is_primary,
            is_active: true,
            disconnected_at: None,
            created_at: Utc::now(),
        };
        state.wallets.push(wallet.clone());
        wallet
    }

    pub async fn add_asset(
        &self,
        wallet: &Wallet,
        symbol: &str,
        balance: Decimal,
        price_usd: Option<Decimal>,
    ) -> Asset {
        let asset = Asset {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            user_id: wallet.user_id,
            symbol: symbol.to_string(),
            balance,
            balance_usd: balance * price_usd.unwrap_or_default(),
            price_usd,
            last_synced: Some(Utc::now()),
        };
        self.state.lock().await.assets.push(asset.clone());
        asset
    }

    pub async fn add_transaction(
        &self,
        user_id: Uuid,
        tx_type: TxType,
        symbol: &str,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id,
            tx_type,
            symbol: symbol.to_string(),
            amount,
            amount_usd: None,
            tx_hash: Some(format!("0x{}", Uuid::new_v4().simple())),
            status: TxStatus::Confirmed,
            created_at,
        };
        self.state.lock().await.transactions.push(tx.clone());
        tx
    }

    pub async fn add_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.state.lock().await.sessions.push((user_id, expires_at));
    }

    pub async fn set_failed_logins(&self, user_id: Uuid, attempts: i32) {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.failed_login_attempts = attempts;
        }
    }

    pub async fn user(&self, user_id: Uuid) -> Option<User> {
        let state = self.state.lock().await;
        state.users.iter().find(|u| u.id == user_id).cloned()
    }

    pub async fn withdrawal_count(&self) -> usize {
        self.state.lock().await.withdrawals.len()
    }

    pub async fn all_audit_logs(&self) -> Vec<AuditLog> {
        self.state.lock().await.audit_logs.clone()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn health_check(&self) -> Result<(), PersistenceError> {
        self.check()
    }

    async fn find_user_by_auth_id(&self, auth_id: &str) -> Result<Option<User>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.auth_id == auth_id).cloned())
    }

    async fn create_user_profile(&self, auth_id: &str, email: &str) -> Result<User, PersistenceError> {
        self.check()?;
        if let Some(existing) = self.find_user_by_auth_id(auth_id).await? {
            return Ok(existing);
        }
        Ok(self.add_user(auth_id, email).await)
    }

    async fn get_user_wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut wallets: Vec<Wallet> = state
            .wallets
            .iter()
            .filter(|w| w.user_id == user_id && w.is_active)
            .cloned()
            .collect();
        wallets.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(wallets)
    }

    async fn get_primary_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .iter()
            .find(|w| w.user_id == user_id && w.is_primary && w.is_active)
            .cloned())
    }

    async fn find_owned_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .wallets
            .iter()
            .find(|w| w.id == wallet_id && w.user_id == user_id && w.is_active)
            .cloned())
    }

    async fn register_wallet(
        &self,
        wallet: &NewWallet,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;

        if let Some(existing) = state.wallets.iter().find(|w| {
            w.user_id == wallet.user_id
                && w.is_active
                && w.address.eq_ignore_ascii_case(&wallet.address)
        }) {
            return Ok(existing.clone());
        }

        let is_primary = !state
            .wallets
            .iter()
            .any(|w| w.user_id == wallet.user_id && w.is_primary && w.is_active);
        let registered = Wallet {
            id: wallet.id,
            user_id: wallet.user_id,
            address: wallet.address.clone(),
            wallet_type: wallet.wallet_type.clone(),
            label: wallet.label.clone(),
            is_primary,
            is_active: true,
            disconnected_at: None,
            created_at: Utc::now(),
        };
        state.wallets.push(registered.clone());
        state.push_audit(audit);
        Ok(registered)
    }

    async fn disconnect_wallet(
        &self,
        wallet_id: Uuid,
        user_id: Uuid,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;

        let wallet = state
            .wallets
            .iter_mut()
            .find(|w| w.id == wallet_id && w.user_id == user_id && w.is_active)
            .ok_or_else(|| PersistenceError::NotFound {
                entity: "wallet",
                id: wallet_id.to_string(),
            })?;
        let was_primary = wallet.is_primary;
        wallet.is_active = false;
        wallet.is_primary = false;
        wallet.disconnected_at = Some(Utc::now());
        let disconnected = wallet.clone();

        if was_primary {
            if let Some(next) = state
                .wallets
                .iter_mut()
                .filter(|w| w.user_id == user_id && w.is_active)
                .min_by_key(|w| w.created_at)
            {
                next.is_primary = true;
            }
        }

        state.push_audit(audit);
        Ok(disconnected)
    }

    async fn get_user_assets(&self, user_id: Uuid) -> Result<Vec<Asset>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut assets: Vec<Asset> = state.held_assets(user_id).cloned().collect();
        assets.sort_by(|a, b| {
            b.balance_usd
                .cmp(&a.balance_usd)
                .then(a.symbol.cmp(&b.symbol))
        });
        Ok(assets)
    }

    async fn get_wallet_assets(&self, wallet_id: Uuid) -> Result<Vec<Asset>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut assets: Vec<Asset> = state
            .assets
            .iter()
            .filter(|a| a.wallet_id == wallet_id && a.balance > Decimal::ZERO)
            .cloned()
            .collect();
        assets.sort_by(|a, b| b.balance_usd.cmp(&a.balance_usd));
        Ok(assets)
    }

    async fn find_wallet_asset(
        &self,
        wallet_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Asset>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .assets
            .iter()
            .find(|a| a.wallet_id == wallet_id && a.symbol == symbol)
            .cloned())
    }

    async fn update_asset_balance(
        &self,
        asset_id: Uuid,
        balance: Decimal,
    ) -> Result<Asset, PersistenceError> {
        self.check()?;
        if balance.is_sign_negative() {
            return Err(PersistenceError::Invalid(format!(
                "balance must not be negative, got {}",
                balance
            )));
        }

        let mut state = self.state.lock().await;
        let asset = state
            .assets
            .iter_mut()
            .find(|a| a.id == asset_id)
            .ok_or_else(|| PersistenceError::NotFound {
                entity: "asset",
                id: asset_id.to_string(),
            })?;
        asset.balance = balance;
        asset.balance_usd = balance * asset.price_usd.unwrap_or_default();
        asset.last_synced = Some(Utc::now());
        Ok(asset.clone())
    }

    async fn get_transaction_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut txs: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.tx_hash.as_deref() == Some(tx_hash))
            .cloned())
    }

    async fn commit_withdrawal(
        &self,
        withdrawal: &NewWithdrawal,
        audit: &NewAuditLog,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;

        let balance = state
            .assets
            .iter()
            .find(|a| a.wallet_id == withdrawal.wallet_id && a.symbol == withdrawal.symbol)
            .map(|a| a.balance)
            .ok_or_else(|| PersistenceError::NotFound {
                entity: "asset",
                id: format!("{}/{}", withdrawal.wallet_id, withdrawal.symbol),
            })?;

        let reserved: Decimal = state
            .withdrawals
            .iter()
            .filter(|w| {
                w.wallet_id == withdrawal.wallet_id
                    && w.symbol == withdrawal.symbol
                    && w.status == WithdrawalStatus::Pending
            })
            .map(|w| w.amount + w.fee_amount)
            .sum();

        let available = balance - reserved;
        let required = withdrawal.total_required();
        if available < required {
            return Err(PersistenceError::InsufficientFunds {
                available,
                required,
            });
        }

        let request = WithdrawalRequest {
            id: withdrawal.id,
            user_id: withdrawal.user_id,
            wallet_id: withdrawal.wallet_id,
            symbol: withdrawal.symbol.clone(),
            amount: withdrawal.amount,
            amount_usd: withdrawal.amount_usd,
            destination_address: withdrawal.destination_address.clone(),
            network: withdrawal.network.clone(),
            fee_amount: withdrawal.fee_amount,
            fee_usd: withdrawal.fee_usd,
            status: WithdrawalStatus::Pending,
            tx_hash: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.withdrawals.push(request.clone());
        state.push_audit(audit);
        Ok(request)
    }

    async fn get_withdrawal_request(
        &self,
        id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.withdrawals.iter().find(|w| w.id == id).cloned())
    }

    async fn get_withdrawal_requests(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalRequest>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut requests: Vec<WithdrawalRequest> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(limit.max(0) as usize);
        Ok(requests)
    }

    async fn update_withdrawal_status(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        tx_hash: Option<&str>,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;

        let request = state
            .withdrawals
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| PersistenceError::NotFound {
                entity: "withdrawal",
                id: id.to_string(),
            })?;

        let previous = request.status;
        if !previous.can_transition_to(status) {
            return Err(PersistenceError::TerminalStatus {
                id,
                status: previous,
            });
        }

        request.status = status;
        if let Some(hash) = tx_hash {
            request.tx_hash = Some(hash.to_string());
        }
        if status == WithdrawalStatus::Completed {
            request.completed_at = Some(Utc::now());
        }
        let updated = request.clone();

        state.push_audit(&NewAuditLog {
            user_id: updated.user_id,
            action: AuditAction::WithdrawalStatusChanged,
            entity_type: WITHDRAWAL_ENTITY.to_string(),
            entity_id: id,
            old_values: Some(serde_json::json!({ "status": previous })),
            new_values: Some(serde_json::json!({ "status": status, "tx_hash": tx_hash })),
        });
        Ok(updated)
    }

    async fn insert_price_history(
        &self,
        price: &NewPriceHistory,
    ) -> Result<PriceHistory, PersistenceError> {
        self.check()?;
        let row = PriceHistory {
            id: Uuid::new_v4(),
            symbol: price.symbol.clone(),
            price_usd: price.price_usd,
            price_change_24h: price.price_change_24h,
            market_cap: price.market_cap,
            volume_24h: price.volume_24h,
            circulating_supply: price.circulating_supply,
            timestamp: price.timestamp.unwrap_or_else(Utc::now),
            source: price.source.clone(),
        };
        self.state.lock().await.prices.push(row.clone());
        Ok(row)
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<Option<PriceHistory>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.latest_price(symbol).cloned())
    }

    async fn get_price_history(
        &self,
        symbol: &str,
        days_back: i64,
        limit: i64,
    ) -> Result<Vec<PriceHistory>, PersistenceError> {
        self.check()?;
        let since = Utc::now() - Duration::days(days_back);
        let state = self.state.lock().await;
        let mut rows: Vec<PriceHistory> = state
            .prices
            .iter()
            .filter(|p| p.symbol == symbol && p.timestamp >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn create_price_alert(&self, alert: &NewPriceAlert) -> Result<PriceAlert, PersistenceError> {
        self.check()?;
        let row = PriceAlert {
            id: Uuid::new_v4(),
            user_id: alert.user_id,
            symbol: alert.symbol.clone(),
            alert_type: alert.alert_type,
            target_price: alert.target_price,
            is_active: true,
            triggered_at: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.alerts.push(row.clone());
        Ok(row)
    }

    async fn get_user_price_alerts(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<PriceAlert>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut alerts: Vec<PriceAlert> = state
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && (a.is_active || !active_only))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn delete_price_alert(&self, alert_id: Uuid, user_id: Uuid) -> Result<bool, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let before = state.alerts.len();
        state
            .alerts
            .retain(|a| !(a.id == alert_id && a.user_id == user_id));
        Ok(state.alerts.len() < before)
    }

    async fn log_audit_event(&self, entry: &NewAuditLog) -> Result<AuditLog, PersistenceError> {
        self.check()?;
        Ok(self.state.lock().await.push_audit(entry))
    }

    async fn get_audit_logs(&self, user_id: Uuid, limit: i64) -> Result<Vec<AuditLog>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut logs: Vec<AuditLog> = state
            .audit_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }

    async fn create_portfolio_snapshot(
        &self,
        snapshot: &NewPortfolioSnapshot,
    ) -> Result<PortfolioSnapshot, PersistenceError> {
        self.check()?;
        let row = PortfolioSnapshot {
            id: Uuid::new_v4(),
            user_id: snapshot.user_id,
            snapshot_date: Utc::now(),
            total_value_usd: snapshot.total_value_usd,
            total_value_btc: snapshot.total_value_btc,
            total_value_eth: snapshot.total_value_eth,
            assets_count: snapshot.assets_count,
            allocation_data: snapshot.allocation_data.clone(),
        };
        self.state.lock().await.snapshots.push(row.clone());
        Ok(row)
    }

    async fn get_portfolio_snapshots(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut rows: Vec<PortfolioSnapshot> = state
            .snapshots
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.snapshot_date.cmp(&a.snapshot_date));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn portfolio_value(&self, user_id: Uuid) -> Result<PortfolioValue, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let (total, count) = state
            .held_assets(user_id)
            .fold((Decimal::ZERO, 0i64), |(total, count), a| {
                (total + a.balance_usd, count + 1)
            });
        Ok(PortfolioValue {
            total_value_usd: total,
            assets_count: count,
        })
    }

    async fn portfolio_change_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<PortfolioChange, PersistenceError> {
        let current = self.portfolio_value(user_id).await?.total_value_usd;
        let state = self.state.lock().await;
        let previous: Decimal = state
            .assets
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| {
                state
                    .latest_price_at(&a.symbol, since)
                    .map(|p| a.balance * p.price_usd)
            })
            .sum();
        Ok(PortfolioChange::between(previous, current))
    }

    async fn portfolio_allocation(&self, user_id: Uuid) -> Result<Vec<AllocationEntry>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let mut by_symbol: HashMap<String, Decimal> = HashMap::new();
        for asset in state.assets.iter().filter(|a| a.user_id == user_id) {
            *by_symbol.entry(asset.symbol.clone()).or_default() += asset.balance_usd;
        }
        Ok(allocation_from_values(by_symbol.into_iter().collect()))
    }

    async fn update_asset_prices(&self) -> Result<u64, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let latest: HashMap<String, Decimal> = state
            .assets
            .iter()
            .filter_map(|a| state.latest_price(&a.symbol).map(|p| (a.symbol.clone(), p.price_usd)))
            .collect();

        let mut updated = 0;
        for asset in state.assets.iter_mut() {
            if let Some(price) = latest.get(&asset.symbol) {
                asset.price_usd = Some(*price);
                asset.balance_usd = asset.balance * *price;
                asset.last_synced = Some(Utc::now());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn check_and_trigger_price_alerts(&self) -> Result<u64, PersistenceError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let latest: HashMap<String, Decimal> = state
            .alerts
            .iter()
            .filter_map(|a| state.latest_price(&a.symbol).map(|p| (a.symbol.clone(), p.price_usd)))
            .collect();

        let mut triggered = 0;
        for alert in state.alerts.iter_mut().filter(|a| a.is_active) {
            if let Some(price) = latest.get(&alert.symbol) {
                if alert.alert_type.is_triggered(alert.target_price, *price) {
                    alert.is_active = false;
                    alert.triggered_at = Some(Utc::now());
                    triggered += 1;
                }
            }
        }
        Ok(triggered)
    }

    async fn cleanup_expired_sessions(&self) -> Result<u64, PersistenceError> {
        self.check()?;
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|(_, expires_at)| *expires_at >= now);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn unlock_expired_account_locks(&self) -> Result<u64, PersistenceError> {
        self.check()?;
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let mut unlocked = 0;
        for user in state.users.iter_mut() {
            let expired = matches!(user.locked_until, Some(until) if until < now);
            if user.account_status == AccountStatus::Locked && expired {
                user.account_status = AccountStatus::Active;
                user.locked_until = None;
                user.failed_login_attempts = 0;
                unlocked += 1;
            }
        }
        Ok(unlocked)
    }

    async fn lock_accounts_excessive_attempts(&self) -> Result<u64, PersistenceError> {
        self.check()?;
        let until = Utc::now() + Duration::minutes(ACCOUNT_LOCK_MINUTES as i64);
        let mut state = self.state.lock().await;
        let mut locked = 0;
        for user in state.users.iter_mut() {
            if user.account_status == AccountStatus::Active
                && user.failed_login_attempts >= MAX_FAILED_LOGIN_ATTEMPTS
            {
                user.account_status = AccountStatus::Locked;
                user.locked_until = Some(until);
                locked += 1;
            }
        }
        Ok(locked)
    }

    async fn list_users_with_assets(&self) -> Result<Vec<Uuid>, PersistenceError> {
        self.check()?;
        let state = self.state.lock().await;
        let users: BTreeSet<Uuid> = state.assets.iter().map(|a| a.user_id).collect();
        Ok(users.into_iter().collect())
    }
}
