//! Business logic services.
//!
//! Reviewer selection and the workflow engine hold the business rules; the
//! HTTP modules adapt them to JSON over HTTP.

pub mod http_api;
pub mod http_server;
pub mod reviewer_selection;
pub mod workflow;

pub use http_api::ApiState;
pub use workflow::{with_cancellation, ReviewWorkflow};
