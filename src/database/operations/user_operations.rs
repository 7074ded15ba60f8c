use crate::database::utils::{get_enum, optional_row};
use crate::error::PersistenceError;
use crate::types::User;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const USER_COLUMNS: &str = "id, auth_id, email, account_status, is_verified, \
     failed_login_attempts, locked_until, created_at";

pub struct UserOperations;

impl UserOperations {
    pub async fn find_by_auth_id(
        pool: &PgPool,
        auth_id: &str,
    ) -> Result<Option<User>, PersistenceError> {
        let row = optional_row(
            sqlx::query(&format!(
                "SELECT {} FROM users WHERE auth_id = $1",
                USER_COLUMNS
            ))
            .bind(auth_id)
            .fetch_one(pool)
            .await,
        )?;

        row.map(|r| map_user(&r)).transpose()
    }

    /// Creates the profile row for a freshly signed-up identity. Signing up
    /// twice returns the existing profile.
    pub async fn create_profile(
        pool: &PgPool,
        auth_id: &str,
        email: &str,
    ) -> Result<User, PersistenceError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (auth_id, email)
            VALUES ($1, $2)
            ON CONFLICT (auth_id) DO UPDATE SET updated_at = NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(auth_id)
        .bind(email)
        .fetch_one(pool)
        .await?;

        map_user(&row)
    }
}

fn map_user(row: &PgRow) -> Result<User, PersistenceError> {
    Ok(User {
        id: row.try_get("id")?,
        auth_id: row.try_get("auth_id")?,
        email: row.try_get("email")?,
        account_status: get_enum(row, "account_status")?,
        is_verified: row.try_get("is_verified")?,
        failed_login_attempts: row.try_get("failed_login_attempts")?,
        locked_until: row.try_get("locked_until")?,
        created_at: row.try_get("created_at")?,
    })
}
