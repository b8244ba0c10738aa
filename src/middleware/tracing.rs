//! Request tracing middleware
//!
//! Every request runs inside a `request` span carrying its id, so log lines
//! emitted by the order and payment services can be correlated with the
//! HTTP call that caused them.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::rate_limiter::client_ip;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Reuse a caller-supplied id when it is usable as a header value
fn request_id_for(request: &Request) -> HeaderValue {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN && v.to_str().is_ok())
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("unknown"))
}

pub async fn request_tracing(mut request: Request, next: Next) -> Response {
    let request_id = request_id_for(&request);
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    let span = tracing::info_span!(
        "request",
        id = request_id.to_str().unwrap_or_default(),
        method = %request.method(),
        path = %request.uri().path(),
        client_ip = ?client_ip(&request),
    );

    let started = Instant::now();
    let mut response = async move {
        tracing::debug!("Request started");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| match status {
        500..=u16::MAX => tracing::error!(status, elapsed_ms, "Request failed"),
        400..=499 => tracing::warn!(status, elapsed_ms, "Request rejected"),
        _ => tracing::info!(status, elapsed_ms, "Request completed"),
    });

    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
