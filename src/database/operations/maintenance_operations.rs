use crate::error::PersistenceError;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub const MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;
pub const ACCOUNT_LOCK_MINUTES: i32 = 30;

pub struct MaintenanceOperations;

impl MaintenanceOperations {
    /// Copies the latest stored price of each symbol onto every holding of it
    /// and recomputes the USD values.
    pub async fn update_asset_prices(pool: &PgPool) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            WITH latest AS (
                SELECT DISTINCT ON (symbol) symbol, price_usd
                FROM price_history
                ORDER BY symbol, timestamp DESC
            )
            UPDATE assets a
            SET price_usd = l.price_usd,
                balance_usd = a.balance * l.price_usd,
                last_synced = NOW()
            FROM latest l
            WHERE a.symbol = l.symbol
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired_sessions(pool: &PgPool) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn unlock_expired_account_locks(pool: &PgPool) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET account_status = 'active', locked_until = NULL,
                failed_login_attempts = 0, updated_at = NOW()
            WHERE account_status = 'locked' AND locked_until IS NOT NULL AND locked_until < NOW()
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn lock_accounts_excessive_attempts(pool: &PgPool) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET account_status = 'locked',
                locked_until = NOW() + make_interval(mins => $2),
                updated_at = NOW()
            WHERE account_status = 'active' AND failed_login_attempts >= $1
            "#,
        )
        .bind(MAX_FAILED_LOGIN_ATTEMPTS)
        .bind(ACCOUNT_LOCK_MINUTES)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn users_with_assets(pool: &PgPool) -> Result<Vec<Uuid>, PersistenceError> {
        let rows = sqlx::query("SELECT DISTINCT user_id FROM assets ORDER BY user_id")
            .fetch_all(pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("user_id").map_err(PersistenceError::from))
            .collect()
    }
}
