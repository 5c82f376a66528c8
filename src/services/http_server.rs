//! HTTP server for the review-assignment API.
//!
//! Assembles the router with tracing and per-request timeout middleware and
//! runs it until the shutdown token is cancelled.

use crate::services::http_api::{api_routes, ApiState};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the full router.
///
/// Requests that run longer than `request_timeout` are answered with
/// 408; dropping the handler future rolls back any open transaction.
pub fn build_router(state: ApiState, request_timeout: Duration) -> Router {
    api_routes()
        .with_state(state)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Unmatched paths get the same error envelope as handler failures.
async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": "NOT_FOUND",
                "message": format!("no route for {}", uri.path()),
            }
        })),
    )
}

/// Serve `router` on `listener` until `shutdown` is cancelled, then drain
/// in-flight connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("[http] Server listening on http://{}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;

    log::info!("[http] Server stopped");
    Ok(())
}
