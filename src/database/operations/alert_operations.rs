use crate::database::utils::get_enum;
use crate::error::PersistenceError;
use crate::types::{NewPriceAlert, PriceAlert};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const ALERT_COLUMNS: &str =
    "id, user_id, symbol, alert_type, target_price, is_active, triggered_at, created_at";

pub struct AlertOperations;

impl AlertOperations {
    pub async fn create(pool: &PgPool, alert: &NewPriceAlert) -> Result<PriceAlert, PersistenceError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO price_alerts (user_id, symbol, alert_type, target_price)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert.user_id)
        .bind(&alert.symbol)
        .bind(alert.alert_type.as_str())
        .bind(alert.target_price)
        .fetch_one(pool)
        .await?;

        map_alert(&row)
    }

    pub async fn get_user_alerts(
        pool: &PgPool,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<PriceAlert>, PersistenceError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM price_alerts
            WHERE user_id = $1 AND (is_active OR NOT $2)
            ORDER BY created_at DESC
            "#,
            ALERT_COLUMNS
        ))
        .bind(user_id)
        .bind(active_only)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_alert).collect()
    }

    /// Returns whether a row owned by `user_id` was removed.
    pub async fn delete(pool: &PgPool, alert_id: Uuid, user_id: Uuid) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM price_alerts WHERE id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fires every active alert whose condition holds against the latest
    /// stored price. Fired alerts are deactivated and stamped.
    pub async fn check_and_trigger(pool: &PgPool) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            r#"
            WITH latest AS (
                SELECT DISTINCT ON (symbol) symbol, price_usd
                FROM price_history
                ORDER BY symbol, timestamp DESC
            )
            UPDATE price_alerts a
            SET is_active = FALSE, triggered_at = NOW()
            FROM latest l
            WHERE a.symbol = l.symbol
              AND a.is_active
              AND (
                (a.alert_type = 'above' AND l.price_usd >= a.target_price)
                OR (a.alert_type = 'below' AND l.price_usd <= a.target_price)
              )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn map_alert(row: &PgRow) -> Result<PriceAlert, PersistenceError> {
    Ok(PriceAlert {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        symbol: row.try_get("symbol")?,
        alert_type: get_enum(row, "alert_type")?,
        target_price: row.try_get("target_price")?,
        is_active: row.try_get("is_active")?,
        triggered_at: row.try_get("triggered_at")?,
        created_at: row.try_get("created_at")?,
    })
}
