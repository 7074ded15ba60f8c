use crate::database::utils::optional_row;
use crate::error::PersistenceError;
use crate::types::{NewPriceHistory, PriceHistory};
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const PRICE_COLUMNS: &str = "id, symbol, price_usd, price_change_24h, market_cap, volume_24h, \
     circulating_supply, timestamp, source";

pub struct PriceOperations;

impl PriceOperations {
    /// 记录一次价格观测
    pub async fn insert_price_history(
        pool: &PgPool,
        price: &NewPriceHistory,
    ) -> Result<PriceHistory, PersistenceError> {
        let timestamp = price.timestamp.unwrap_or_else(Utc::now);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO price_history (
                symbol, price_usd, price_change_24h, market_cap, volume_24h,
                circulating_supply, timestamp, source
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRICE_COLUMNS
        ))
        .bind(&price.symbol)
        .bind(price.price_usd)
        .bind(price.price_change_24h)
        .bind(price.market_cap)
        .bind(price.volume_24h)
        .bind(price.circulating_supply)
        .bind(timestamp)
        .bind(&price.source)
        .fetch_one(pool)
        .await?;

        map_price(&row)
    }

    /// 获取最新价格
    pub async fn get_latest_price(
        pool: &PgPool,
        symbol: &str,
    ) -> Result<Option<PriceHistory>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                r#"
                SELECT {}
                FROM price_history
                WHERE symbol = $1
                ORDER BY timestamp DESC
                LIMIT 1
                "#,
                PRICE_COLUMNS
            ))
            .bind(symbol)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_price(&r)).transpose()
    }

    /// Observations from the last `days_back` days, newest first.
    pub async fn get_price_history(
        pool: &PgPool,
        symbol: &str,
        days_back: i64,
        limit: i64,
    ) -> Result<Vec<PriceHistory>, PersistenceError> {
        let since = Utc::now() - Duration::days(days_back);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM price_history
            WHERE symbol = $1 AND timestamp >= $2
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
            PRICE_COLUMNS
        ))
        .bind(symbol)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_price).collect()
    }
}

fn map_price(row: &PgRow) -> Result<PriceHistory, PersistenceError> {
    Ok(PriceHistory {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        price_usd: row.try_get("price_usd")?,
        price_change_24h: row.try_get("price_change_24h")?,
        market_cap: row.try_get("market_cap")?,
        volume_24h: row.try_get("volume_24h")?,
        circulating_supply: row.try_get("circulating_supply")?,
        timestamp: row.try_get("timestamp")?,
        source: row.try_get("source")?,
    })
}
