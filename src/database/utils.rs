use crate::error::PersistenceError;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;

/// Turns a single-row read into an optional one.
///
/// Only `RowNotFound` means "no rows"; every other failure is a real query
/// error and is propagated.
pub fn optional_row<T>(result: Result<T, sqlx::Error>) -> Result<Option<T>, PersistenceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(PersistenceError::Database(e)),
    }
}

/// Decodes a text column into one of the closed enums.
pub fn get_enum<T>(row: &PgRow, column: &str) -> Result<T, PersistenceError>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(PersistenceError::Invalid)
}
