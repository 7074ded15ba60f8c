use crate::error::PersistenceError;
use sqlx::PgPool;

pub struct SystemOperations;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        auth_id VARCHAR(255) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL,
        account_status VARCHAR(20) NOT NULL DEFAULT 'active'
            CHECK (account_status IN ('active', 'locked')),
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        failed_login_attempts INTEGER NOT NULL DEFAULT 0,
        locked_until TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_sessions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        wallet_address VARCHAR(100) NOT NULL,
        wallet_type VARCHAR(50) NOT NULL,
        label VARCHAR(100),
        is_primary BOOLEAN NOT NULL DEFAULT FALSE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        disconnected_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        wallet_id UUID NOT NULL REFERENCES wallets(id),
        user_id UUID NOT NULL REFERENCES users(id),
        symbol VARCHAR(20) NOT NULL,
        balance DECIMAL(36, 18) NOT NULL DEFAULT 0 CHECK (balance >= 0),
        balance_usd DECIMAL(36, 18) NOT NULL DEFAULT 0,
        price_usd DECIMAL(36, 18),
        last_synced TIMESTAMPTZ,
        UNIQUE (wallet_id, symbol)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        tx_type VARCHAR(10) NOT NULL CHECK (tx_type IN ('send', 'receive', 'swap')),
        symbol VARCHAR(20) NOT NULL,
        amount DECIMAL(36, 18) NOT NULL,
        amount_usd DECIMAL(36, 18),
        tx_hash VARCHAR(100),
        status VARCHAR(20) NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'confirmed', 'failed')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS withdrawal_requests (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        wallet_id UUID NOT NULL REFERENCES wallets(id),
        symbol VARCHAR(20) NOT NULL,
        amount DECIMAL(36, 18) NOT NULL CHECK (amount > 0),
        amount_usd DECIMAL(36, 18) NOT NULL,
        destination_address VARCHAR(255) NOT NULL,
        network VARCHAR(50) NOT NULL,
        fee_amount DECIMAL(36, 18) NOT NULL,
        fee_usd DECIMAL(36, 18) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'completed', 'failed')),
        tx_hash VARCHAR(100),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS price_history (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        symbol VARCHAR(20) NOT NULL,
        price_usd DECIMAL(36, 18) NOT NULL,
        price_change_24h DECIMAL(36, 18),
        market_cap DECIMAL(38, 2),
        volume_24h DECIMAL(38, 2),
        circulating_supply DECIMAL(38, 2),
        timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        source VARCHAR(50) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS price_alerts (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        symbol VARCHAR(20) NOT NULL,
        alert_type VARCHAR(10) NOT NULL CHECK (alert_type IN ('above', 'below')),
        target_price DECIMAL(36, 18) NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        triggered_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        action VARCHAR(50) NOT NULL,
        entity_type VARCHAR(50) NOT NULL,
        entity_id UUID NOT NULL,
        old_values JSONB,
        new_values JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS portfolio_snapshots (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id UUID NOT NULL REFERENCES users(id),
        snapshot_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        total_value_usd DECIMAL(36, 18) NOT NULL,
        total_value_btc DECIMAL(36, 18),
        total_value_eth DECIMAL(36, 18),
        assets_count INTEGER NOT NULL,
        allocation_data JSONB
    )
    "#,
];

const INDEXES: &[&str] = &[
    // one active primary wallet per user
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_wallets_one_primary ON wallets(user_id) WHERE is_primary AND is_active",
    "CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_assets_user ON assets(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_created ON transactions(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_hash ON transactions(tx_hash)",
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_wallet_status ON withdrawal_requests(wallet_id, symbol, status)",
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_user_created ON withdrawal_requests(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_price_history_symbol_ts ON price_history(symbol, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_price_alerts_active ON price_alerts(symbol) WHERE is_active",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_user_created ON audit_logs(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_user_date ON portfolio_snapshots(user_id, snapshot_date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON user_sessions(expires_at)",
];

impl SystemOperations {
    pub async fn create_tables(pool: &PgPool) -> Result<(), PersistenceError> {
        for statement in TABLES.iter().chain(INDEXES.iter()) {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }

    pub async fn health_check(pool: &PgPool) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1 AS health_check").fetch_one(pool).await?;
        Ok(())
    }
}
