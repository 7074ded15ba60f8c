use crate::database::operations::audit_operations::AuditOperations;
use crate::database::utils::{get_enum, optional_row};
use crate::error::PersistenceError;
use crate::types::{
    AuditAction, NewAuditLog, NewWithdrawal, WithdrawalRequest, WithdrawalStatus,
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, wallet_id, symbol, amount, amount_usd, \
     destination_address, network, fee_amount, fee_usd, status, tx_hash, created_at, completed_at";

/// Audit `entity_type` for every withdrawal event; matches the table name.
pub const WITHDRAWAL_ENTITY: &str = "withdrawal_requests";

pub struct WithdrawalOperations;

impl WithdrawalOperations {
    /// Inserts a pending withdrawal and its audit entry in one transaction.
    ///
    /// The holding row is locked first and the amount still free after every
    /// pending withdrawal on the same wallet and symbol is recomputed, so two
    /// concurrent requests cannot both reserve the same balance.
    pub async fn commit(
        pool: &PgPool,
        withdrawal: &NewWithdrawal,
        audit: &NewAuditLog,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        let mut tx = pool.begin().await?;

        let balance: Decimal = optional_row(
            sqlx::query(
                "SELECT balance FROM assets WHERE wallet_id = $1 AND symbol = $2 FOR UPDATE",
            )
            .bind(withdrawal.wallet_id)
            .bind(&withdrawal.symbol)
            .fetch_one(&mut *tx)
            .await,
        )?
        .ok_or_else(|| PersistenceError::NotFound {
            entity: "asset",
            id: format!("{}/{}", withdrawal.wallet_id, withdrawal.symbol),
        })?
        .try_get("balance")?;

        let reserved: Decimal = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount + fee_amount), 0) AS reserved
            FROM withdrawal_requests
            WHERE wallet_id = $1 AND symbol = $2 AND status = 'pending'
            "#,
        )
        .bind(withdrawal.wallet_id)
        .bind(&withdrawal.symbol)
        .fetch_one(&mut *tx)
        .await?
        .try_get("reserved")?;

        let available = balance - reserved;
        let required = withdrawal.total_required();
        if available < required {
            tx.rollback().await?;
            return Err(PersistenceError::InsufficientFunds {
                available,
                required,
            });
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO withdrawal_requests
            (id, user_id, wallet_id, symbol, amount, amount_usd, destination_address,
             network, fee_amount, fee_usd, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending')
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(withdrawal.id)
        .bind(withdrawal.user_id)
        .bind(withdrawal.wallet_id)
        .bind(&withdrawal.symbol)
        .bind(withdrawal.amount)
        .bind(withdrawal.amount_usd)
        .bind(&withdrawal.destination_address)
        .bind(&withdrawal.network)
        .bind(withdrawal.fee_amount)
        .bind(withdrawal.fee_usd)
        .fetch_one(&mut *tx)
        .await?;

        AuditOperations::insert_with(&mut tx, audit).await?;
        tx.commit().await?;

        map_withdrawal(&row)
    }

    pub async fn get_request(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<WithdrawalRequest>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM withdrawal_requests WHERE id = $1",
                WITHDRAWAL_COLUMNS
            ))
            .bind(id)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_withdrawal(&r)).transpose()
    }

    pub async fn get_requests(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalRequest>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM withdrawal_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_withdrawal).collect()
    }

    /// Moves a pending withdrawal to a terminal state. Terminal rows never change.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: WithdrawalStatus,
        tx_hash: Option<&str>,
    ) -> Result<WithdrawalRequest, PersistenceError> {
        let mut tx = pool.begin().await?;

        let current = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM withdrawal_requests WHERE id = $1 FOR UPDATE",
                WITHDRAWAL_COLUMNS
            ))
            .bind(id)
            .fetch_one(&mut *tx)
            .await,
        )?
        .ok_or_else(|| PersistenceError::NotFound {
            entity: "withdrawal",
            id: id.to_string(),
        })?;
        let current = map_withdrawal(&current)?;

        if !current.status.can_transition_to(status) {
            tx.rollback().await?;
            return Err(PersistenceError::TerminalStatus {
                id,
                status: current.status,
            });
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                tx_hash = COALESCE($3, tx_hash),
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END
            WHERE id = $1
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(tx_hash)
        .fetch_one(&mut *tx)
        .await?;

        let audit = NewAuditLog {
            user_id: current.user_id,
            action: AuditAction::WithdrawalStatusChanged,
            entity_type: WITHDRAWAL_ENTITY.to_string(),
            entity_id: id,
            old_values: Some(json!({ "status": current.status })),
            new_values: Some(json!({ "status": status, "tx_hash": tx_hash })),
        };
        AuditOperations::insert_with(&mut tx, &audit).await?;
        tx.commit().await?;

        info!("💸 Withdrawal {} moved {} -> {}", id, current.status, status);
        map_withdrawal(&row)
    }
}

fn map_withdrawal(row: &PgRow) -> Result<WithdrawalRequest, PersistenceError> {
    Ok(WithdrawalRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        wallet_id: row.try_get("wallet_id")?,
        symbol: row.try_get("symbol")?,
        amount: row.try_get("amount")?,
        amount_usd: row.try_get("amount_usd")?,
        destination_address: row.try_get("destination_address")?,
        network: row.try_get("network")?,
        fee_amount: row.try_get("fee_amount")?,
        fee_usd: row.try_get("fee_usd")?,
        status: get_enum(row, "status")?,
        tx_hash: row.try_get("tx_hash")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
