use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Container health check paths, logged at debug.
const HEALTH_PATHS: &[&str] = &["/health", "/ready"];

pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::warn!(%method, %uri, status = status.as_u16(), duration_ms, "request failed");
    } else if HEALTH_PATHS.contains(&uri.path()) {
        tracing::debug!(%method, %uri, status = status.as_u16(), duration_ms, "health check");
    } else {
        tracing::info!(%method, %uri, status = status.as_u16(), duration_ms, "request completed");
    }

    response
}
