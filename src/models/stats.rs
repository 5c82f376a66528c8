//! Review-load statistics.

use serde::Serialize;
use sqlx::FromRow;

/// Number of assignments held by one reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ReviewerLoad {
    pub reviewer_id: String,
    pub count: i64,
}

/// System-wide review statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub total_prs: i64,
    pub open_prs: i64,
    pub merged_prs: i64,

    /// Busiest reviewers by assignment count, descending; ties broken by
    /// reviewer id ascending.
    pub top_reviewers: Vec<ReviewerLoad>,
}
