//! Per-endpoint-class rate limiting middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::HeaderValue;
use shared::error::{AppError, ErrorCode};

use crate::limiter::{self, Decision, RatePolicy};
use crate::state::AppState;

/// Rate limit middleware for product reads: 100 requests/minute per IP
pub async fn product_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(state, request, next, limiter::PRODUCT_READS).await
}

/// Rate limit middleware for order endpoints: 50 requests/minute per IP
pub async fn order_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(state, request, next, limiter::ORDER_WRITES).await
}

/// Rate limit middleware for queue status: 30 requests/minute per IP
pub async fn queue_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(state, request, next, limiter::QUEUE_STATUS).await
}

async fn enforce(state: AppState, request: Request, next: Next, policy: RatePolicy) -> Response {
    let ip = client_ip(&request);
    let key = limiter::bucket_key(&policy, &ip);

    let decision = match state.limiter.allow(&key, policy).await {
        Ok(decision) => decision,
        Err(e) => {
            // Store failure fails closed: no admission decision is taken
            tracing::error!(error = %e, key = %key, "Rate limiter store error");
            return AppError::new(ErrorCode::RateLimiterUnavailable).into_response();
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        AppError::new(ErrorCode::RateLimited).into_response()
    };

    apply_headers(&mut response, &policy, &decision);
    response
}

/// Attach the standard rate-limit headers, on 200 and 429 alike.
fn apply_headers(response: &mut Response, policy: &RatePolicy, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(policy.capacity));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset));
}

/// Extract client IP: X-Real-IP (reverse proxy sets from remote_host),
/// then X-Forwarded-For last entry, then peer address.
fn client_ip(request: &Request) -> String {
    if let Some(real_ip) = request.headers().get("x-real-ip")
        && let Ok(ip) = real_ip.to_str()
    {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    // Fallback: last entry in X-Forwarded-For
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(last) = val.rsplit(',').next()
    {
        let ip = last.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    // Fallback: peer address from ConnectInfo
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}
