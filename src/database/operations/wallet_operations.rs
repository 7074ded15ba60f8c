use crate::database::operations::audit_operations::AuditOperations;
use crate::database::utils::optional_row;
use crate::error::PersistenceError;
use crate::types::{NewAuditLog, NewWallet, Wallet};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

const WALLET_COLUMNS: &str = "id, user_id, wallet_address, wallet_type, label, is_primary, \
     is_active, disconnected_at, created_at";

pub struct WalletOperations;

impl WalletOperations {
    pub async fn get_user_wallets(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Wallet>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM wallets
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY is_primary DESC, created_at ASC
            "#,
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_wallet).collect()
    }

    pub async fn get_primary_wallet(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM wallets WHERE user_id = $1 AND is_primary AND is_active",
                WALLET_COLUMNS
            ))
            .bind(user_id)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_wallet(&r)).transpose()
    }

    /// Looks a wallet up by id and owner in one query, so "does not exist"
    /// and "belongs to someone else" are indistinguishable to the caller.
    pub async fn find_owned(
        pool: &PgPool,
        wallet_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM wallets WHERE id = $1 AND user_id = $2 AND is_active = TRUE",
                WALLET_COLUMNS
            ))
            .bind(wallet_id)
            .bind(user_id)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_wallet(&r)).transpose()
    }

    /// Registers a verified wallet and its audit entry together. The first
    /// active wallet of a user becomes primary; re-registering an address the
    /// user already has returns the existing row.
    pub async fn register(
        pool: &PgPool,
        wallet: &NewWallet,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        let mut tx = pool.begin().await?;

        // serialize registrations per user
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(wallet.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let existing = optional_row(
            sqlx::query(&format!(
                r#"
                SELECT {}
                FROM wallets
                WHERE user_id = $1 AND LOWER(wallet_address) = LOWER($2) AND is_active = TRUE
                "#,
                WALLET_COLUMNS
            ))
            .bind(wallet.user_id)
            .bind(&wallet.address)
            .fetch_one(&mut *tx)
            .await,
        )?;

        if let Some(row) = existing {
            tx.rollback().await?;
            return map_wallet(&row);
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO wallets (id, user_id, wallet_address, wallet_type, label, is_primary)
            VALUES ($1, $2, $3, $4, $5, NOT EXISTS (
                SELECT 1 FROM wallets WHERE user_id = $2 AND is_primary AND is_active
            ))
            RETURNING {}
            "#,
            WALLET_COLUMNS
        ))
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(&wallet.address)
        .bind(&wallet.wallet_type)
        .bind(&wallet.label)
        .fetch_one(&mut *tx)
        .await?;

        AuditOperations::insert_with(&mut tx, audit).await?;
        tx.commit().await?;

        let registered = map_wallet(&row)?;
        info!(
            "👛 Wallet {} registered for user {} (primary: {})",
            registered.address, registered.user_id, registered.is_primary
        );
        Ok(registered)
    }

    /// Deactivates a wallet. When it was the primary one, the oldest remaining
    /// active wallet is promoted.
    pub async fn disconnect(
        pool: &PgPool,
        wallet_id: Uuid,
        user_id: Uuid,
        audit: &NewAuditLog,
    ) -> Result<Wallet, PersistenceError> {
        let mut tx = pool.begin().await?;

        let row = optional_row(
            sqlx::query(&format!(
                r#"
                UPDATE wallets
                SET is_active = FALSE, is_primary = FALSE, disconnected_at = NOW()
                WHERE id = $1 AND user_id = $2 AND is_active = TRUE
                RETURNING {}, (SELECT is_primary FROM wallets WHERE id = $1) AS was_primary
                "#,
                WALLET_COLUMNS
            ))
            .bind(wallet_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await,
        )?
        .ok_or_else(|| PersistenceError::NotFound {
            entity: "wallet",
            id: wallet_id.to_string(),
        })?;

        let was_primary: bool = row.try_get("was_primary")?;
        if was_primary {
            sqlx::query(
                r#"
                UPDATE wallets SET is_primary = TRUE
                WHERE id = (
                    SELECT id FROM wallets
                    WHERE user_id = $1 AND is_active = TRUE
                    ORDER BY created_at ASC
                    LIMIT 1
                )
                "#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        AuditOperations::insert_with(&mut tx, audit).await?;
        tx.commit().await?;

        map_wallet(&row)
    }
}

fn map_wallet(row: &PgRow) -> Result<Wallet, PersistenceError> {
    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        address: row.try_get("wallet_address")?,
        wallet_type: row.try_get("wallet_type")?,
        label: row.try_get("label")?,
        is_primary: row.try_get("is_primary")?,
        is_active: row.try_get("is_active")?,
        disconnected_at: row.try_get("disconnected_at")?,
        created_at: row.try_get("created_at")?,
    })
}
