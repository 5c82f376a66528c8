//! Team queries.

use crate::error::AppError;
use sqlx::SqliteConnection;

/// Insert a team record.
///
/// Returns the raw store error so callers can detect a name collision.
pub async fn insert(conn: &mut SqliteConnection, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO teams (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Check whether a team with this name exists.
pub async fn exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM teams WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.is_some())
}
