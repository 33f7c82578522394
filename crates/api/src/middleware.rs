use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn};

/// One structured line per request with its status and latency.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        warn!(%method, %uri, status = status.as_u16(), duration_ms, "request failed");
    } else {
        info!(%method, %uri, status = status.as_u16(), duration_ms, "request handled");
    }
    response
}
