//! Pull request model.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Lifecycle status of a pull request.
///
/// `Open` is initial, `Merged` is terminal: there is no transition out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl FromStr for PullRequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            other => Err(AppError::internal(format!(
                "unknown pull request status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
}

impl NewPullRequest {
    pub fn new(id: impl Into<String>, title: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author_id: author_id.into(),
        }
    }
}

/// A pull request with its reviewer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,

    #[serde(rename = "pull_request_name")]
    pub title: String,

    pub author_id: String,

    pub status: PullRequestStatus,

    /// Reviewer user IDs. Unordered; never contains the author.
    #[serde(rename = "assigned_reviewers")]
    pub reviewers: Vec<String>,

    /// Assigned by the store at insert.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Assigned by the store when the PR transitions to merged.
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.status == PullRequestStatus::Open
    }

    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.reviewers.iter().any(|r| r == user_id)
    }
}

/// Pull request summary used in per-reviewer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestShort {
    #[serde(rename = "pull_request_id")]
    pub id: String,

    #[serde(rename = "pull_request_name")]
    pub title: String,

    pub author_id: String,

    pub status: PullRequestStatus,
}

/// Row shape of the `pull_requests` table. Timestamps are Unix seconds.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestRow {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub status: String,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::internal(format!("timestamp out of range: {}", secs)))
}

impl PullRequestRow {
    /// Attach the reviewer set and convert store values into the model.
    pub fn into_pull_request(self, reviewers: Vec<String>) -> Result<PullRequest, AppError> {
        Ok(PullRequest {
            status: self.status.parse()?,
            created_at: timestamp(self.created_at)?,
            merged_at: self.merged_at.map(timestamp).transpose()?,
            id: self.id,
            title: self.title,
            author_id: self.author_id,
            reviewers,
        })
    }
}

impl TryFrom<PullRequestRow> for PullRequestShort {
    type Error = AppError;

    fn try_from(row: PullRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            title: row.title,
            author_id: row.author_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, merged_at: Option<i64>) -> PullRequestRow {
        PullRequestRow {
            id: "pr-1".into(),
            title: "Add retries".into(),
            author_id: "u1".into(),
            status: status.into(),
            created_at: 1_700_000_000,
            merged_at,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("OPEN".parse::<PullRequestStatus>().unwrap(), PullRequestStatus::Open);
        assert_eq!("MERGED".parse::<PullRequestStatus>().unwrap(), PullRequestStatus::Merged);
        assert_eq!(PullRequestStatus::Merged.to_string(), "MERGED");
        assert!("closed".parse::<PullRequestStatus>().is_err());
    }

    #[test]
    fn test_row_conversion() {
        let pr = row("MERGED", Some(1_700_000_100))
            .into_pull_request(vec!["u2".into()])
            .unwrap();
        assert!(pr.is_merged());
        assert!(pr.has_reviewer("u2"));
        assert!(!pr.has_reviewer("u1"));
        assert_eq!(pr.merged_at.unwrap().timestamp(), 1_700_000_100);
    }

    #[test]
    fn test_unknown_status_is_internal_error() {
        let err = row("DRAFT", None).into_pull_request(vec![]).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_wire_shape() {
        let pr = row("OPEN", None).into_pull_request(vec!["u2".into()]).unwrap();
        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["pull_request_id"], "pr-1");
        assert_eq!(json["pull_request_name"], "Add retries");
        assert_eq!(json["status"], "OPEN");
        assert_eq!(json["assigned_reviewers"][0], "u2");
        assert!(json["mergedAt"].is_null());
        assert!(json["createdAt"].as_str().unwrap().starts_with("2023-11-14"));
    }
}
