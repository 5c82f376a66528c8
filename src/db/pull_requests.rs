//! Pull request and reviewer-assignment queries.

use crate::error::AppError;
use crate::models::pull_request::PullRequestRow;
use crate::models::{NewPullRequest, PullRequest, PullRequestShort, ReviewStats, ReviewerLoad};
use sqlx::SqliteConnection;

/// Insert an open pull request; the store assigns `created_at`.
///
/// Returns the raw store error so callers can detect an id collision.
pub async fn insert(
    conn: &mut SqliteConnection,
    pr: &NewPullRequest,
) -> Result<PullRequestRow, sqlx::Error> {
    sqlx::query_as::<_, PullRequestRow>(
        r#"
        INSERT INTO pull_requests (id, title, author_id, status)
        VALUES (?, ?, ?, 'OPEN')
        RETURNING id, title, author_id, status, created_at, merged_at
        "#,
    )
    .bind(&pr.id)
    .bind(&pr.title)
    .bind(&pr.author_id)
    .fetch_one(&mut *conn)
    .await
}

/// Get a pull request row without its reviewers.
pub async fn get_row(conn: &mut SqliteConnection, id: &str) -> Result<Option<PullRequestRow>, AppError> {
    let row = sqlx::query_as::<_, PullRequestRow>(
        "SELECT id, title, author_id, status, created_at, merged_at FROM pull_requests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

/// Get a pull request with its reviewer IDs.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<PullRequest>, AppError> {
    let Some(row) = get_row(conn, id).await? else {
        return Ok(None);
    };

    let reviewers = list_reviewers(conn, id).await?;
    row.into_pull_request(reviewers).map(Some)
}

/// Reviewer IDs assigned to a pull request, ordered by ID.
pub async fn list_reviewers(conn: &mut SqliteConnection, pr_id: &str) -> Result<Vec<String>, AppError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ? ORDER BY reviewer_id",
    )
    .bind(pr_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// Transition an open pull request to merged, stamping `merged_at` in the
/// same statement.
///
/// # Returns
/// `true` if this call performed the transition, `false` if the PR was
/// missing or already merged
pub async fn mark_merged(conn: &mut SqliteConnection, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE pull_requests
        SET status = 'MERGED', merged_at = strftime('%s', 'now')
        WHERE id = ? AND status = 'OPEN'
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Assign a reviewer to a pull request.
///
/// Returns the raw store error so callers can detect a duplicate assignment.
pub async fn add_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO pr_reviewers (pull_request_id, reviewer_id) VALUES (?, ?)")
        .bind(pr_id)
        .bind(reviewer_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Remove a reviewer assignment.
///
/// # Returns
/// `true` if an assignment was removed
pub async fn remove_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM pr_reviewers WHERE pull_request_id = ? AND reviewer_id = ?")
        .bind(pr_id)
        .bind(reviewer_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Pull requests of any status on which the user is an assigned reviewer,
/// oldest first.
pub async fn list_for_reviewer(
    conn: &mut SqliteConnection,
    reviewer_id: &str,
) -> Result<Vec<PullRequestShort>, AppError> {
    let rows = sqlx::query_as::<_, PullRequestRow>(
        r#"
        SELECT pr.id, pr.title, pr.author_id, pr.status, pr.created_at, pr.merged_at
        FROM pull_requests pr
        JOIN pr_reviewers rev ON rev.pull_request_id = pr.id
        WHERE rev.reviewer_id = ?
        ORDER BY pr.created_at, pr.id
        "#,
    )
    .bind(reviewer_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(PullRequestShort::try_from).collect()
}

/// Remove every assignment held by members of `team_name` on open pull
/// requests. Assignments on merged pull requests are history and stay.
///
/// # Returns
/// Number of assignments removed
pub async fn remove_team_reviewers_from_open(
    conn: &mut SqliteConnection,
    team_name: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        DELETE FROM pr_reviewers
        WHERE reviewer_id IN (SELECT id FROM users WHERE team_name = ?)
          AND pull_request_id IN (SELECT id FROM pull_requests WHERE status = 'OPEN')
        "#,
    )
    .bind(team_name)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Reviewers with the most assignments, descending by count, ties broken by
/// reviewer ID ascending.
pub async fn top_reviewers(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<ReviewerLoad>, AppError> {
    let reviewers = sqlx::query_as::<_, ReviewerLoad>(
        r#"
        SELECT reviewer_id, COUNT(*) AS count
        FROM pr_reviewers
        GROUP BY reviewer_id
        ORDER BY count DESC, reviewer_id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(reviewers)
}

/// PR counts plus the `limit` busiest reviewers.
pub async fn stats(conn: &mut SqliteConnection, limit: i64) -> Result<ReviewStats, AppError> {
    let (total_prs, open_prs, merged_prs): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN status = 'OPEN' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'MERGED' THEN 1 ELSE 0 END), 0)
        FROM pull_requests
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    let top_reviewers = top_reviewers(conn, limit).await?;

    Ok(ReviewStats {
        total_prs,
        open_prs,
        merged_prs,
        top_reviewers,
    })
}
