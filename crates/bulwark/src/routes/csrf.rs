//! CSRF token issuance.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct TokenResponse {
    ok: bool,
    token: String,
}

/// Hand out the caller's token, setting the cookie if it has none yet
pub async fn issue_token(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let issued = state.csrf.issue(&uri, &headers);

    let mut response = Json(TokenResponse {
        ok: true,
        token: issued.token,
    })
    .into_response();

    if let Some(cookie) = issued.set_cookie {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "CSRF cookie is not a valid header value"),
        }
    }

    response
}
