use crate::database::utils::get_enum;
use crate::error::PersistenceError;
use crate::types::{AuditLog, NewAuditLog};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

pub struct AuditOperations;

impl AuditOperations {
    pub async fn log_event(pool: &PgPool, entry: &NewAuditLog) -> Result<AuditLog, PersistenceError> {
        let mut conn = pool.acquire().await?;
        Self::insert_with(&mut conn, entry).await
    }

    /// Writes an audit row on an existing connection so it can share a
    /// transaction with the change it records.
    pub async fn insert_with(
        conn: &mut PgConnection,
        entry: &NewAuditLog,
    ) -> Result<AuditLog, PersistenceError> {
        let row = sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, entity_type, entity_id, old_values, new_values)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, action, entity_type, entity_id, old_values, new_values, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .fetch_one(&mut *conn)
        .await?;

        map_audit_log(&row)
    }

    pub async fn get_logs(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, old_values, new_values, created_at
            FROM audit_logs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.iter().map(map_audit_log).collect()
    }
}

fn map_audit_log(row: &PgRow) -> Result<AuditLog, PersistenceError> {
    Ok(AuditLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        action: get_enum(row, "action")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        old_values: row.try_get("old_values")?,
        new_values: row.try_get("new_values")?,
        created_at: row.try_get("created_at")?,
    })
}
