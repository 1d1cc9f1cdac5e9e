//! Double-submit cookie guard.

use axum::http::{HeaderMap, Uri, header};
use bulwark_common::GuardError;
use bulwark_common::constants::csrf::{COOKIE_MAX_AGE_SECS, COOKIE_NAME, HEADER_NAME};
use bulwark_common::constants::headers::X_FORWARDED_PROTO;
use cookie::{Cookie, SameSite};

use super::token::{generate_token, tokens_match};

/// Token issued (or reused) for a request
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Cookie to set when the request did not carry one
    pub set_cookie: Option<Cookie<'static>>,
}

/// Issues and validates the `csrf_token` cookie / `x-csrf-token` header pair
#[derive(Debug, Clone, Default)]
pub struct CsrfGuard {
    /// Force the `Secure` attribute on or off; `None` follows the request scheme
    secure_override: Option<bool>,
    /// Honour `X-Forwarded-Proto` when deciding the scheme
    trust_proxy: bool,
}

impl CsrfGuard {
    pub fn new(secure_override: Option<bool>, trust_proxy: bool) -> Self {
        Self {
            secure_override,
            trust_proxy,
        }
    }

    /// Reuse the request's token, or mint one and build its cookie
    pub fn issue(&self, uri: &Uri, headers: &HeaderMap) -> IssuedToken {
        if let Some(token) = cookie_token(headers) {
            return IssuedToken {
                token,
                set_cookie: None,
            };
        }

        let token = generate_token();
        let secure = self
            .secure_override
            .unwrap_or_else(|| self.is_https(uri, headers));

        tracing::debug!(secure = secure, "Issuing CSRF cookie");

        IssuedToken {
            set_cookie: Some(build_cookie(token.clone(), secure)),
            token,
        }
    }

    /// Both halves must be present and equal
    pub fn validate(&self, cookie: Option<&str>, header: Option<&str>) -> Result<(), GuardError> {
        let (Some(cookie), Some(header)) = (cookie, header) else {
            tracing::debug!(
                has_cookie = cookie.is_some(),
                has_header = header.is_some(),
                "CSRF token missing"
            );
            return Err(GuardError::CsrfInvalid);
        };

        if tokens_match(header, cookie) {
            Ok(())
        } else {
            tracing::debug!("CSRF token mismatch");
            Err(GuardError::CsrfInvalid)
        }
    }

    /// Validate straight from request headers
    pub fn validate_headers(&self, headers: &HeaderMap) -> Result<(), GuardError> {
        let cookie = cookie_token(headers);
        let header = header_token(headers);
        self.validate(cookie.as_deref(), header)
    }

    fn is_https(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        if uri.scheme_str() == Some("https") {
            return true;
        }
        self.trust_proxy
            && headers
                .get(X_FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
    }
}

/// Readable by scripts (not HttpOnly) so they can echo it in the header
fn build_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .http_only(false)
        .max_age(cookie::time::Duration::seconds(COOKIE_MAX_AGE_SECS))
        .build()
}

/// Token from the `Cookie` header(s), if present and non-empty
fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
