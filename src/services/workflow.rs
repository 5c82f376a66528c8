//! Review workflow engine.
//!
//! Orchestrates the multi-step operations over the entity store: creating a
//! pull request with reviewers, merging, reassigning a reviewer, and team
//! membership/activity changes. Every multi-step mutation runs in one
//! transaction; any error rolls it back before returning.
//!
//! Precondition reads run on a pooled connection before the transaction
//! starts, so each transaction opens with a write and holds SQLite's write
//! lock for its whole lifetime. Checks that a concurrent request could
//! invalidate are repeated inside the transaction.

use crate::db::pool::DbPool;
use crate::db::{self, pull_requests, teams, users};
use crate::error::AppError;
use crate::models::{
    NewPullRequest, NewTeamMember, PullRequest, PullRequestShort, PullRequestStatus, ReviewStats,
    Team, User,
};
use crate::services::reviewer_selection::{select_reviewers, REVIEWERS_PER_PULL_REQUEST};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Number of reviewers reported in statistics.
pub const TOP_REVIEWERS_LIMIT: i64 = 5;

/// The workflow engine.
///
/// Holds the store pool and the random source for reviewer selection, both
/// supplied at construction. Share it across requests behind an `Arc`.
pub struct ReviewWorkflow {
    pool: DbPool,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ReviewWorkflow {
    /// Create an engine with an entropy-seeded random source.
    pub fn new(pool: DbPool) -> Self {
        Self::with_rng(pool, StdRng::from_entropy())
    }

    /// Create an engine with a caller-supplied random source.
    pub fn with_rng<R>(pool: DbPool, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self {
            pool,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn pick(&self, candidates: &[User], exclude: &str, count: usize) -> Vec<User> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        select_reviewers(candidates, exclude, count, &mut **rng)
    }

    // ── Teams and users ─────────────────────────────────────────────────────

    /// Create a team together with its initial members, atomically.
    ///
    /// Members are stamped with the new team's name. A member whose ID
    /// already exists is moved into this team.
    pub async fn create_team(&self, name: &str, members: Vec<NewTeamMember>) -> Result<Team, AppError> {
        let mut conn = self.pool.acquire().await?;
        if teams::exists(&mut conn, name).await? {
            log::debug!("[workflow] Team {} already exists", name);
            return Err(AppError::team_exists(name));
        }
        drop(conn);

        let mut tx = self.pool.begin().await?;
        let result = insert_team(&mut tx, name, members).await;
        let team = finish(tx, result, "create_team").await?;

        log::info!(
            "[workflow] Created team {} with {} members",
            team.name,
            team.members.len()
        );
        Ok(team)
    }

    /// Get a team with its current members.
    pub async fn get_team(&self, name: &str) -> Result<Team, AppError> {
        let mut conn = self.pool.acquire().await?;
        if !teams::exists(&mut conn, name).await? {
            return Err(AppError::not_found_with_id("team", name));
        }

        let members = users::list_by_team(&mut conn, name).await?;
        Ok(Team {
            name: name.to_string(),
            members,
        })
    }

    /// Deactivate every member of a team and strip their reviews from open
    /// pull requests. Reviews on merged pull requests are left untouched.
    pub async fn deactivate_team(&self, name: &str) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        if !teams::exists(&mut conn, name).await? {
            return Err(AppError::not_found_with_id("team", name));
        }
        drop(conn);

        let mut tx = self.pool.begin().await?;
        let result = deactivate_members(&mut tx, name).await;
        let (deactivated, removed) = finish(tx, result, "deactivate_team").await?;

        log::info!(
            "[workflow] Deactivated team {}: {} users deactivated, {} open reviews removed",
            name,
            deactivated,
            removed
        );
        Ok(())
    }

    /// Set a user's activity flag.
    pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::set_active(&mut conn, user_id, is_active)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("user", user_id))?;

        log::info!("[workflow] User {} is_active={}", user.id, user.is_active);
        Ok(user)
    }

    /// All pull requests, of any status, on which the user is a reviewer.
    pub async fn get_user_reviews(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        let mut conn = self.pool.acquire().await?;
        if users::get_by_id(&mut conn, user_id).await?.is_none() {
            return Err(AppError::not_found_with_id("user", user_id));
        }

        pull_requests::list_for_reviewer(&mut conn, user_id).await
    }

    // ── Pull requests ───────────────────────────────────────────────────────

    /// Create an open pull request and assign up to two active teammates of
    /// the author as reviewers.
    ///
    /// Fewer than two reviewers (including none) is not an error.
    pub async fn create_pull_request(&self, input: NewPullRequest) -> Result<PullRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        let author = users::get_by_id(&mut conn, &input.author_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("author", &input.author_id))?;

        if pull_requests::get_row(&mut conn, &input.id).await?.is_some() {
            log::debug!("[workflow] PR {} already exists", input.id);
            return Err(AppError::pr_exists(&input.id));
        }
        drop(conn);

        let mut tx = self.pool.begin().await?;
        let result = self.insert_with_reviewers(&mut tx, &input, &author).await;
        let pr = finish(tx, result, "create_pull_request").await?;

        log::info!(
            "[workflow] Created PR {} by {} with reviewers {:?}",
            pr.id,
            pr.author_id,
            pr.reviewers
        );
        Ok(pr)
    }

    async fn insert_with_reviewers(
        &self,
        conn: &mut SqliteConnection,
        input: &NewPullRequest,
        author: &User,
    ) -> Result<PullRequest, AppError> {
        // The pre-check can race with a concurrent create; the primary key
        // decides the winner.
        let row = pull_requests::insert(conn, input).await.map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::pr_exists(&input.id)
            } else {
                AppError::from(e)
            }
        })?;

        let candidates = users::list_active_by_team(conn, &author.team_name).await?;
        let reviewers = self.pick(&candidates, &author.id, REVIEWERS_PER_PULL_REQUEST);

        let mut reviewer_ids = Vec::with_capacity(reviewers.len());
        for reviewer in reviewers {
            pull_requests::add_reviewer(conn, &row.id, &reviewer.id).await?;
            reviewer_ids.push(reviewer.id);
        }
        reviewer_ids.sort();

        row.into_pull_request(reviewer_ids)
    }

    /// Get a pull request with its reviewers.
    pub async fn get_pull_request(&self, id: &str) -> Result<PullRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        pull_requests::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("pull request", id))
    }

    /// Merge a pull request.
    ///
    /// Idempotent: merging a merged pull request returns it unchanged
    /// without writing.
    pub async fn merge_pull_request(&self, id: &str) -> Result<PullRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        let pr = pull_requests::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("pull request", id))?;

        if pr.is_merged() {
            log::debug!("[workflow] PR {} already merged", id);
            return Ok(pr);
        }

        // A concurrent merge may win between the read and the update; the
        // conditional update then does nothing and the re-read returns the
        // winner's timestamp.
        if pull_requests::mark_merged(&mut conn, id).await? {
            log::info!("[workflow] Merged PR {}", id);
        }

        pull_requests::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("pull request", id))
    }

    /// Replace one reviewer on an open pull request with a random eligible
    /// teammate of the outgoing reviewer.
    ///
    /// # Returns
    /// ID of the new reviewer
    pub async fn reassign_reviewer(&self, pr_id: &str, old_reviewer_id: &str) -> Result<String, AppError> {
        let mut conn = self.pool.acquire().await?;
        let pr = pull_requests::get_by_id(&mut conn, pr_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("pull request", pr_id))?;

        if pr.is_merged() {
            return Err(AppError::pr_merged(pr_id));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::not_assigned(pr_id, old_reviewer_id));
        }

        let old_reviewer = users::get_by_id(&mut conn, old_reviewer_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("user", old_reviewer_id))?;

        // Current reviewers include the outgoing one.
        let eligible: Vec<User> = users::list_active_by_team(&mut conn, &old_reviewer.team_name)
            .await?
            .into_iter()
            .filter(|u| u.id != pr.author_id && !pr.has_reviewer(&u.id))
            .collect();
        drop(conn);

        let new_reviewer = self
            .pick(&eligible, old_reviewer_id, 1)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::no_candidate(pr_id))?;

        let mut tx = self.pool.begin().await?;
        let result = swap_reviewer(&mut tx, pr_id, old_reviewer_id, &new_reviewer.id).await;
        finish(tx, result, "reassign_reviewer").await?;

        log::info!(
            "[workflow] Reassigned PR {}: {} -> {}",
            pr_id,
            old_reviewer_id,
            new_reviewer.id
        );
        Ok(new_reviewer.id)
    }

    /// Total PR counts and the busiest reviewers.
    pub async fn stats(&self) -> Result<ReviewStats, AppError> {
        let mut conn = self.pool.acquire().await?;
        pull_requests::stats(&mut conn, TOP_REVIEWERS_LIMIT).await
    }
}

async fn insert_team(
    conn: &mut SqliteConnection,
    name: &str,
    members: Vec<NewTeamMember>,
) -> Result<Team, AppError> {
    teams::insert(conn, name).await.map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::team_exists(name)
        } else {
            AppError::from(e)
        }
    })?;

    for member in members {
        users::upsert(conn, &member.into_user(name)).await?;
    }

    let members = users::list_by_team(conn, name).await?;
    Ok(Team {
        name: name.to_string(),
        members,
    })
}

async fn deactivate_members(conn: &mut SqliteConnection, name: &str) -> Result<(u64, u64), AppError> {
    let deactivated = users::deactivate_team(conn, name).await?;
    let removed = pull_requests::remove_team_reviewers_from_open(conn, name).await?;
    Ok((deactivated, removed))
}

async fn swap_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    old_reviewer_id: &str,
    new_reviewer_id: &str,
) -> Result<(), AppError> {
    if !pull_requests::remove_reviewer(conn, pr_id, old_reviewer_id).await? {
        return Err(AppError::not_assigned(pr_id, old_reviewer_id));
    }

    // The delete took the write lock, so this read cannot be stale.
    let row = pull_requests::get_row(conn, pr_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("pull request", pr_id))?;
    if row.status.parse::<PullRequestStatus>()? == PullRequestStatus::Merged {
        return Err(AppError::pr_merged(pr_id));
    }

    pull_requests::add_reviewer(conn, pr_id, new_reviewer_id)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::no_candidate(pr_id)
            } else {
                AppError::from(e)
            }
        })
}

/// Commit on success; roll back explicitly on error before returning it.
async fn finish<T>(
    tx: Transaction<'static, Sqlite>,
    result: Result<T, AppError>,
    operation: &str,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| AppError::database_with_op(e.to_string(), operation))?;
            Ok(value)
        }
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => log::debug!("[workflow] {} rolled back: {}", operation, err),
                Err(rollback_err) => {
                    log::warn!("[workflow] {} rollback failed: {}", operation, rollback_err)
                }
            }
            Err(err)
        }
    }
}

/// Run a workflow operation until it completes or `token` is cancelled.
///
/// On cancellation the operation's future is dropped, which rolls back any
/// transaction it had open.
pub async fn with_cancellation<T, F>(token: &CancellationToken, operation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AppError::Cancelled),
        result = operation => result,
    }
}
