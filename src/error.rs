//! Application error types.
//!
//! Every workflow operation returns one of these variants. The stable
//! [`AppError::code`] strings are what callers match on; the HTTP adapter
//! maps them to status codes.

use thiserror::Error;

/// Application-level errors produced by the workflow engine and its store.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced team, user or pull request does not exist.
    #[error("{resource} not found")]
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// Team name is already taken.
    #[error("team_name already exists: {team_name}")]
    TeamExists { team_name: String },

    /// Pull request id is already taken.
    #[error("PR id already exists: {pr_id}")]
    PrExists { pr_id: String },

    /// Operation is forbidden on a merged pull request.
    #[error("cannot reassign on merged PR: {pr_id}")]
    PrMerged { pr_id: String },

    /// The user is not currently a reviewer on the pull request.
    #[error("reviewer {user_id} is not assigned to PR {pr_id}")]
    NotAssigned { pr_id: String, user_id: String },

    /// No eligible replacement reviewer exists in the team.
    #[error("no active replacement candidate in team for PR {pr_id}")]
    NoCandidate { pr_id: String },

    /// Invalid input provided at the boundary.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        operation: Option<String>,
    },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn team_exists(team_name: impl Into<String>) -> Self {
        Self::TeamExists {
            team_name: team_name.into(),
        }
    }

    pub fn pr_exists(pr_id: impl Into<String>) -> Self {
        Self::PrExists {
            pr_id: pr_id.into(),
        }
    }

    pub fn pr_merged(pr_id: impl Into<String>) -> Self {
        Self::PrMerged {
            pr_id: pr_id.into(),
        }
    }

    pub fn not_assigned(pr_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pr_id: pr_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn no_candidate(pr_id: impl Into<String>) -> Self {
        Self::NoCandidate {
            pr_id: pr_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TeamExists { .. } => "TEAM_EXISTS",
            Self::PrExists { .. } => "PR_EXISTS",
            Self::PrMerged { .. } => "PR_MERGED",
            Self::NotAssigned { .. } => "NOT_ASSIGNED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Cancelled => "CANCELLED",
            Self::Database { .. } | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is an unclassified failure whose message must not
    /// reach callers verbatim.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Internal { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(AppError::not_found("user").code(), "NOT_FOUND");
        assert_eq!(AppError::team_exists("backend").code(), "TEAM_EXISTS");
        assert_eq!(AppError::pr_exists("pr-1").code(), "PR_EXISTS");
        assert_eq!(AppError::pr_merged("pr-1").code(), "PR_MERGED");
        assert_eq!(AppError::not_assigned("pr-1", "u1").code(), "NOT_ASSIGNED");
        assert_eq!(AppError::no_candidate("pr-1").code(), "NO_CANDIDATE");
        assert_eq!(AppError::Cancelled.code(), "CANCELLED");
        assert_eq!(AppError::database("locked").code(), "INTERNAL_ERROR");
        assert_eq!(AppError::internal("boom").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_internal_classification() {
        assert!(AppError::database_with_op("disk I/O error", "merge_pull_request").is_internal());
        assert!(AppError::internal("boom").is_internal());
        assert!(!AppError::not_found("team").is_internal());
        assert!(!AppError::invalid_input_field("required", "team_name").is_internal());
    }

    #[test]
    fn test_display_impl() {
        assert_eq!(
            format!("{}", AppError::not_found_with_id("pull request", "pr-7")),
            "pull request not found"
        );
        assert_eq!(
            format!("{}", AppError::not_assigned("pr-7", "u2")),
            "reviewer u2 is not assigned to PR pr-7"
        );
    }

    #[test]
    fn test_from_sqlx_error_is_unclassified() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database { .. }));
    }
}
