//! Rate limiting middleware
//!
//! Per-client token buckets. Gateway webhooks and health probes are exempt.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::error::ApiError;

/// Buckets idle for longer than this are dropped during cleanup
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(600);

/// Cleanup runs whenever the map grows past this many clients
const CLEANUP_THRESHOLD: usize = 10_000;

const EXEMPT_PREFIXES: &[&str] = &["/api/webhooks/", "/health"];

/// Token bucket for rate limiting
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, tokens_per_second: f64, max_tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * tokens_per_second).min(max_tokens);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate limiter state
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    tokens_per_second: f64,
    max_tokens: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            tokens_per_second: requests_per_second as f64,
            // Allow burst of 2x
            max_tokens: (requests_per_second * 2) as f64,
        }
    }

    /// Check if a request from `key` is allowed
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock();

        if buckets.len() > CLEANUP_THRESHOLD {
            let now = Instant::now();
            buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < IDLE_BUCKET_TTL);
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens))
            .try_consume(self.tokens_per_second, self.max_tokens)
    }
}

fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Rate limiting middleware; mount with `from_fn_with_state`
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let client_key = client_ip(&request).unwrap_or_else(|| "unknown".to_string());
    if !limiter.check(&client_key) {
        tracing::warn!(client = %client_key, "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        return response;
    }

    next.run(request).await
}

/// Client IP from proxy headers
pub fn client_ip(request: &Request) -> Option<String> {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
}
