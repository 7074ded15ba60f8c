use crate::database::utils::{get_enum, optional_row};
use crate::error::PersistenceError;
use crate::types::Transaction;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, tx_type, symbol, amount, amount_usd, tx_hash, status, created_at";

pub struct TransactionOperations;

impl TransactionOperations {
    /// Newest first.
    pub async fn get_history(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_transaction).collect()
    }

    pub async fn get_by_hash(
        pool: &PgPool,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM transactions WHERE tx_hash = $1 ORDER BY created_at DESC LIMIT 1",
                TRANSACTION_COLUMNS
            ))
            .bind(tx_hash)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_transaction(&r)).transpose()
    }
}

fn map_transaction(row: &PgRow) -> Result<Transaction, PersistenceError> {
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        tx_type: get_enum(row, "tx_type")?,
        symbol: row.try_get("symbol")?,
        amount: row.try_get("amount")?,
        amount_usd: row.try_get("amount_usd")?,
        tx_hash: row.try_get("tx_hash")?,
        status: get_enum(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}
