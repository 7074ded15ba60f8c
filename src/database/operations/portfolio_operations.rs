use crate::error::PersistenceError;
use crate::types::{
    allocation_from_values, AllocationEntry, NewPortfolioSnapshot, PortfolioChange,
    PortfolioSnapshot, PortfolioValue,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SNAPSHOT_COLUMNS: &str = "id, user_id, snapshot_date, total_value_usd, total_value_btc, \
     total_value_eth, assets_count, allocation_data";

pub struct PortfolioOperations;

impl PortfolioOperations {
    pub async fn total_value(pool: &PgPool, user_id: Uuid) -> Result<PortfolioValue, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(balance_usd), 0) AS total_value_usd,
                   COUNT(*) AS assets_count
            FROM assets
            WHERE user_id = $1 AND balance > 0
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(PortfolioValue {
            total_value_usd: row.try_get("total_value_usd")?,
            assets_count: row.try_get("assets_count")?,
        })
    }

    /// Values current balances at the latest price observed at or before
    /// `since` and compares with the current value.
    pub async fn change_since(
        pool: &PgPool,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<PortfolioChange, PersistenceError> {
        let current = Self::total_value(pool, user_id).await?.total_value_usd;

        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(a.balance * p.price_usd), 0) AS previous_value_usd
            FROM assets a
            JOIN LATERAL (
                SELECT price_usd
                FROM price_history
                WHERE symbol = a.symbol AND timestamp <= $2
                ORDER BY timestamp DESC
                LIMIT 1
            ) p ON TRUE
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await?;

        let previous: Decimal = row.try_get("previous_value_usd")?;
        Ok(PortfolioChange::between(previous, current))
    }

    pub async fn allocation(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<AllocationEntry>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, SUM(balance_usd) AS value_usd
            FROM assets
            WHERE user_id = $1
            GROUP BY symbol
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let values = rows
            .iter()
            .map(|row| Ok((row.try_get("symbol")?, row.try_get("value_usd")?)))
            .collect::<Result<Vec<(String, Decimal)>, sqlx::Error>>()?;

        Ok(allocation_from_values(values))
    }

    pub async fn create_snapshot(
        pool: &PgPool,
        snapshot: &NewPortfolioSnapshot,
    ) -> Result<PortfolioSnapshot, PersistenceError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO portfolio_snapshots
            (user_id, total_value_usd, total_value_btc, total_value_eth, assets_count, allocation_data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SNAPSHOT_COLUMNS
        ))
        .bind(snapshot.user_id)
        .bind(snapshot.total_value_usd)
        .bind(snapshot.total_value_btc)
        .bind(snapshot.total_value_eth)
        .bind(snapshot.assets_count)
        .bind(&snapshot.allocation_data)
        .fetch_one(pool)
        .await?;

        map_snapshot(&row)
    }

    pub async fn get_snapshots(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PortfolioSnapshot>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM portfolio_snapshots
            WHERE user_id = $1
            ORDER BY snapshot_date DESC
            LIMIT $2
            "#,
            SNAPSHOT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_snapshot).collect()
    }
}

fn map_snapshot(row: &PgRow) -> Result<PortfolioSnapshot, PersistenceError> {
    Ok(PortfolioSnapshot {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        snapshot_date: row.try_get("snapshot_date")?,
        total_value_usd: row.try_get("total_value_usd")?,
        total_value_btc: row.try_get("total_value_btc")?,
        total_value_eth: row.try_get("total_value_eth")?,
        assets_count: row.try_get("assets_count")?,
        allocation_data: row.try_get("allocation_data")?,
    })
}
