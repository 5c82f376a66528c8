//! User queries.

use crate::error::AppError;
use crate::models::User;
use sqlx::SqliteConnection;

/// Insert a user, or move an existing user into `user.team_name` and
/// overwrite its name and activity flag.
pub async fn upsert(conn: &mut SqliteConnection, user: &User) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, is_active, team_name)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            is_active = excluded.is_active,
            team_name = excluded.team_name
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(user.is_active)
    .bind(&user.team_name)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Get a user by ID.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, team_name FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// All members of a team, active or not, ordered by ID.
pub async fn list_by_team(conn: &mut SqliteConnection, team_name: &str) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, team_name FROM users WHERE team_name = ? ORDER BY id",
    )
    .bind(team_name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(users)
}

/// Active members of a team, ordered by ID.
pub async fn list_active_by_team(
    conn: &mut SqliteConnection,
    team_name: &str,
) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, is_active, team_name
        FROM users
        WHERE team_name = ? AND is_active = 1
        ORDER BY id
        "#,
    )
    .bind(team_name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(users)
}

/// Set a user's activity flag in one statement.
///
/// # Returns
/// The updated user, or `None` if no user has this ID
pub async fn set_active(
    conn: &mut SqliteConnection,
    id: &str,
    is_active: bool,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_active = ?
        WHERE id = ?
        RETURNING id, username, is_active, team_name
        "#,
    )
    .bind(is_active)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

/// Clear the activity flag of every member of a team.
///
/// # Returns
/// Number of users updated
pub async fn deactivate_team(conn: &mut SqliteConnection, team_name: &str) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE users SET is_active = 0 WHERE team_name = ?")
        .bind(team_name)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
