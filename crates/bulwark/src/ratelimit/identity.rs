//! Client identity derivation and route-to-category mapping.

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, Method};
use bulwark_common::RateCategory;
use bulwark_common::constants::headers::{X_FORWARDED_FOR, X_REAL_IP};

/// Resolve the address a request should be counted against.
///
/// Proxy headers are only read when `trust_proxy` is set; otherwise a
/// client could pick its own bucket by forging `X-Forwarded-For`.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer.map(|addr| addr.ip())
}

/// Which category a request falls under, if any.
///
/// Safe methods are never limited here.
pub fn route_category(method: &Method, path: &str) -> Option<RateCategory> {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return None;
    }

    let category = if path.starts_with("/api/auth/") {
        RateCategory::Auth
    } else if path.starts_with("/api/uploads") {
        RateCategory::Upload
    } else if path.starts_with("/api/comments") {
        RateCategory::Comment
    } else if path.starts_with("/api/admin/") {
        RateCategory::AdminWrite
    } else {
        RateCategory::Write
    };

    Some(category)
}
