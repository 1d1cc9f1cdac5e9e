//! Ready-to-send rejection responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bulwark_common::GuardError;
use bulwark_common::constants::headers::{RETRY_AFTER, X_RATELIMIT_REMAINING};
use serde::Serialize;

/// `{"ok": false, "error": {"code", "message"}}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// A guard failure on its way to the client
#[derive(Debug)]
pub struct Rejection(pub GuardError);

impl From<GuardError> for Rejection {
    fn from(error: GuardError) -> Self {
        Self(error)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let error = self.0;

        if error.is_internal() {
            tracing::error!(error = %error, code = error.code(), "Guard failed internally");
        }

        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            ok: false,
            error: ErrorDetail {
                code: error.code(),
                message: error.public_message(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let GuardError::RateLimited { decision, .. } = &error {
            let now = chrono::Utc::now().timestamp_millis();
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs(now)));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
        }

        response
    }
}
