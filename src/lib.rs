//! Review Assigner - pull request reviewer assignment service.
//!
//! Teams of users author pull requests; each new pull request gets up to two
//! randomly chosen active teammates of the author as reviewers. Reviewers can
//! be reassigned while the pull request is open, and deactivating a team
//! strips its members from open reviews.
//!
//! The workflow engine in [`services::workflow`] owns the business rules and
//! is exposed over HTTP by [`services::http_server`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;
