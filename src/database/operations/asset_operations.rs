use crate::database::utils::optional_row;
use crate::error::PersistenceError;
use crate::types::Asset;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const ASSET_COLUMNS: &str =
    "id, wallet_id, user_id, symbol, balance, balance_usd, price_usd, last_synced";

pub struct AssetOperations;

impl AssetOperations {
    pub async fn get_user_assets(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Asset>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM assets
            WHERE user_id = $1 AND balance > 0
            ORDER BY balance_usd DESC, symbol ASC
            "#,
            ASSET_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_asset).collect()
    }

    pub async fn get_wallet_assets(
        pool: &PgPool,
        wallet_id: Uuid,
    ) -> Result<Vec<Asset>, PersistenceError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM assets WHERE wallet_id = $1 AND balance > 0 ORDER BY balance_usd DESC",
            ASSET_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_asset).collect()
    }

    pub async fn find_wallet_asset(
        pool: &PgPool,
        wallet_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Asset>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM assets WHERE wallet_id = $1 AND symbol = $2",
                ASSET_COLUMNS
            ))
            .bind(wallet_id)
            .bind(symbol)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_asset(&r)).transpose()
    }

    /// Sets a holding's balance, recomputing its USD value from the stored price.
    pub async fn update_balance(
        pool: &PgPool,
        asset_id: Uuid,
        balance: Decimal,
    ) -> Result<Asset, PersistenceError> {
        if balance.is_sign_negative() {
            return Err(PersistenceError::Invalid(format!(
                "balance must not be negative, got {}",
                balance
            )));
        }

        let row = optional_row(
            sqlx::query(&format!(
                r#"
                UPDATE assets
                SET balance = $2,
                    balance_usd = $2 * COALESCE(price_usd, 0),
                    last_synced = NOW()
                WHERE id = $1
                RETURNING {}
                "#,
                ASSET_COLUMNS
            ))
            .bind(asset_id)
            .bind(balance)
            .fetch_one(pool)
            .await,
        )?
        .ok_or_else(|| PersistenceError::NotFound {
            entity: "asset",
            id: asset_id.to_string(),
        })?;

        map_asset(&row)
    }
}

fn map_asset(row: &PgRow) -> Result<Asset, PersistenceError> {
    Ok(Asset {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        user_id: row.try_get("user_id")?,
        symbol: row.try_get("symbol")?,
        balance: row.try_get("balance")?,
        balance_usd: row.try_get("balance_usd")?,
        price_usd: row.try_get("price_usd")?,
        last_synced: row.try_get("last_synced")?,
    })
}
