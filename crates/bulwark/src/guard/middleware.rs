//! Request guards, applied as axum middleware.
//!
//! Rate limiting runs first so throttled clients never reach the CSRF
//! check; both skip safe methods.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use bulwark_common::constants::headers::X_RATELIMIT_REMAINING;

use super::rejection::Rejection;
use crate::ratelimit::{client_identity, route_category};
use crate::state::AppState;

/// Charge the request to its route category's budget
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let Some(category) = route_category(request.method(), request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // No address at all lands in the shared "unknown" bucket
    let identity = client_identity(request.headers(), peer, state.config.trust_proxy)
        .map(|ip| ip.to_string())
        .unwrap_or_default();

    let decision = state.limiter.enforce(&identity, category).await?;

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    Ok(response)
}

/// Double-submit check for state-changing requests
pub async fn csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    if !is_safe(request.method()) {
        state.csrf.validate_headers(request.headers())?;
    }
    Ok(next.run(request).await)
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
