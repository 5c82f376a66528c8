//! Data models for the application.
//!
//! These models represent the entities held in the SQLite store. Serde
//! attributes give the JSON wire shape; row structs carry the SQL shape.

pub mod pull_request;
pub mod stats;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{NewPullRequest, PullRequest, PullRequestShort, PullRequestStatus};
pub use stats::{ReviewStats, ReviewerLoad};
pub use team::Team;
pub use user::{NewTeamMember, User};
