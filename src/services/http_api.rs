//! REST API routes for the review-assignment service.
//!
//! Handlers validate the request shape, run one workflow operation tied to
//! the server's shutdown token, and translate the result to JSON. No business
//! rules live here.

use crate::error::AppError;
use crate::models::{NewPullRequest, NewTeamMember, PullRequest, PullRequestShort, ReviewStats, Team, User};
use crate::services::workflow::{with_cancellation, ReviewWorkflow};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub workflow: Arc<ReviewWorkflow>,
    /// Cancelled on server shutdown; aborts in-flight operations.
    pub shutdown: CancellationToken,
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::TeamExists { .. } | AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        AppError::PrExists { .. }
        | AppError::PrMerged { .. }
        | AppError::NotAssigned { .. }
        | AppError::NoCandidate { .. } => StatusCode::CONFLICT,
        AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database { .. } | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if self.0.is_internal() {
            log::error!("[http] {}", self.0);
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code: self.0.code(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

type ApiResult<T> = Result<T, ApiErr>;

/// A required string field: present and not blank.
fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::invalid_input_field(
            format!("{} is required", field),
            field,
        )),
    }
}

// ── Request types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AddTeamRequest {
    team_name: Option<String>,
    #[serde(default)]
    members: Vec<NewTeamMember>,
}

#[derive(Deserialize)]
struct TeamNameRequest {
    team_name: Option<String>,
}

#[derive(Deserialize)]
struct SetIsActiveRequest {
    user_id: Option<String>,
    is_active: bool,
}

#[derive(Deserialize)]
struct UserIdQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct CreatePullRequestRequest {
    pull_request_id: Option<String>,
    pull_request_name: Option<String>,
    author_id: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestIdRequest {
    pull_request_id: Option<String>,
}

#[derive(Deserialize)]
struct ReassignRequest {
    pull_request_id: Option<String>,
    #[serde(alias = "old_reviewer_id")]
    old_user_id: Option<String>,
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TeamResponse {
    team: Team,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct UserReviewsResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[derive(Serialize)]
struct PullRequestResponse {
    pr: PullRequest,
}

#[derive(Serialize)]
struct ReassignResponse {
    pr: PullRequest,
    replaced_by: String,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/team/deactivate", post(deactivate_team))
        .route("/users/setIsActive", post(set_is_active))
        .route("/users/getReview", get(get_user_reviews))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/get", get(get_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/health/stats", get(get_stats))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /team/add: create a team with its members.
async fn add_team(
    State(state): State<ApiState>,
    body: Result<Json<AddTeamRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let team_name = required(req.team_name, "team_name")?;
    for member in &req.members {
        if member.user_id.trim().is_empty() {
            return Err(AppError::invalid_input_field("user_id is required", "members.user_id").into());
        }
    }

    let team = with_cancellation(
        &state.shutdown,
        state.workflow.create_team(&team_name, req.members),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<ApiState>,
    query: Result<Query<TeamNameRequest>, QueryRejection>,
) -> ApiResult<Json<Team>> {
    let Query(q) = query?;
    let team_name = required(q.team_name, "team_name")?;

    let team = with_cancellation(&state.shutdown, state.workflow.get_team(&team_name)).await?;
    Ok(Json(team))
}

/// POST /team/deactivate: deactivate all members, drop their open reviews.
async fn deactivate_team(
    State(state): State<ApiState>,
    body: Result<Json<TeamNameRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Json(req) = body?;
    let team_name = required(req.team_name, "team_name")?;

    with_cancellation(&state.shutdown, state.workflow.deactivate_team(&team_name)).await?;
    Ok(Json(StatusResponse {
        status: "deactivated",
    }))
}

/// POST /users/setIsActive
async fn set_is_active(
    State(state): State<ApiState>,
    body: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(req) = body?;
    let user_id = required(req.user_id, "user_id")?;

    let user = with_cancellation(
        &state.shutdown,
        state.workflow.set_user_active(&user_id, req.is_active),
    )
    .await?;
    Ok(Json(UserResponse { user }))
}

/// GET /users/getReview?user_id=X: PRs the user reviews.
async fn get_user_reviews(
    State(state): State<ApiState>,
    query: Result<Query<UserIdQuery>, QueryRejection>,
) -> ApiResult<Json<UserReviewsResponse>> {
    let Query(q) = query?;
    let user_id = required(q.user_id, "user_id")?;

    let pull_requests =
        with_cancellation(&state.shutdown, state.workflow.get_user_reviews(&user_id)).await?;
    Ok(Json(UserReviewsResponse {
        user_id,
        pull_requests,
    }))
}

/// POST /pullRequest/create: create a PR and assign reviewers.
async fn create_pull_request(
    State(state): State<ApiState>,
    body: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body?;
    let input = NewPullRequest::new(
        required(req.pull_request_id, "pull_request_id")?,
        required(req.pull_request_name, "pull_request_name")?,
        required(req.author_id, "author_id")?,
    );

    let pr = with_cancellation(&state.shutdown, state.workflow.create_pull_request(input)).await?;
    Ok((StatusCode::CREATED, Json(PullRequestResponse { pr })))
}

/// GET /pullRequest/get?pull_request_id=X
async fn get_pull_request(
    State(state): State<ApiState>,
    query: Result<Query<PullRequestIdRequest>, QueryRejection>,
) -> ApiResult<Json<PullRequestResponse>> {
    let Query(q) = query?;
    let id = required(q.pull_request_id, "pull_request_id")?;

    let pr = with_cancellation(&state.shutdown, state.workflow.get_pull_request(&id)).await?;
    Ok(Json(PullRequestResponse { pr }))
}

/// POST /pullRequest/merge: idempotent merge.
async fn merge_pull_request(
    State(state): State<ApiState>,
    body: Result<Json<PullRequestIdRequest>, JsonRejection>,
) -> ApiResult<Json<PullRequestResponse>> {
    let Json(req) = body?;
    let id = required(req.pull_request_id, "pull_request_id")?;

    let pr = with_cancellation(&state.shutdown, state.workflow.merge_pull_request(&id)).await?;
    Ok(Json(PullRequestResponse { pr }))
}

/// POST /pullRequest/reassign: replace one reviewer.
async fn reassign_reviewer(
    State(state): State<ApiState>,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> ApiResult<Json<ReassignResponse>> {
    let Json(req) = body?;
    let pr_id = required(req.pull_request_id, "pull_request_id")?;
    let old_user_id = required(req.old_user_id, "old_user_id")?;

    let workflow = &state.workflow;
    let (pr, replaced_by) = with_cancellation(&state.shutdown, async {
        let replaced_by = workflow.reassign_reviewer(&pr_id, &old_user_id).await?;
        let pr = workflow.get_pull_request(&pr_id).await?;
        Ok::<_, AppError>((pr, replaced_by))
    })
    .await?;

    Ok(Json(ReassignResponse { pr, replaced_by }))
}

/// GET /health/stats
async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<ReviewStats>> {
    let stats = with_cancellation(&state.shutdown, state.workflow.stats()).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AppError::not_found("team")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&AppError::team_exists("core")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AppError::pr_exists("p1")), StatusCode::CONFLICT);
        assert_eq!(status_for(&AppError::pr_merged("p1")), StatusCode::CONFLICT);
        assert_eq!(status_for(&AppError::not_assigned("p1", "u1")), StatusCode::CONFLICT);
        assert_eq!(status_for(&AppError::no_candidate("p1")), StatusCode::CONFLICT);
        assert_eq!(status_for(&AppError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&AppError::database("disk full")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert_eq!(required(Some("core".into()), "team_name").unwrap(), "core");
        assert!(matches!(
            required(None, "team_name"),
            Err(AppError::InvalidInput { .. })
        ));
        assert!(matches!(
            required(Some("   ".into()), "team_name"),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_reassign_accepts_legacy_field_name() {
        let req: ReassignRequest =
            serde_json::from_str(r#"{"pull_request_id": "p1", "old_reviewer_id": "u2"}"#).unwrap();
        assert_eq!(req.old_user_id.as_deref(), Some("u2"));
    }
}
