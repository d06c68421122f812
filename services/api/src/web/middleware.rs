//! services/api/src/web/middleware.rs
//!
//! Request logging middleware.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Runs the request inside a span tagged with a fresh request id, logs the outcome
/// and echoes the id back in the `x-request-id` header.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", %request_id, %method, %path);

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let status = response.status();
    span.in_scope(|| {
        if status.is_server_error() {
            warn!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else {
            info!(status = status.as_u16(), elapsed_ms, "Request handled");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
