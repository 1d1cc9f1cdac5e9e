//! Upload intake.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bulwark_common::{DetectedMime, GuardError, UploadPurpose, UploadRejection};
use serde::Serialize;

use crate::guard::Rejection;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    ok: bool,
    purpose: UploadPurpose,
    mime: DetectedMime,
    width: Option<u32>,
    height: Option<u32>,
    /// Size after metadata stripping
    size: usize,
    stripped: bool,
    content_key: String,
}

/// Validate and sanitize a raw upload body for `purpose`
pub async fn upload(
    State(state): State<AppState>,
    Path(raw_purpose): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<UploadResponse>, Response> {
    let purpose: UploadPurpose = raw_purpose
        .parse()
        .map_err(|_| reject(UploadRejection::UnknownPurpose(raw_purpose.clone())))?;

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(reject(UploadRejection::TooLarge {
                purpose,
                actual: declared_length(&headers).unwrap_or(UploadPurpose::max_body_bytes() + 1),
                max: purpose.policy().max_bytes,
            }));
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Upload body unreadable");
            return Err(rejection.into_response());
        }
    };

    let sanitized = state
        .uploads
        .sanitize(body, purpose)
        .await
        .map_err(reject)?;

    tracing::info!(
        purpose = %purpose,
        mime = %sanitized.upload.mime,
        size = sanitized.bytes.len(),
        stripped = sanitized.stripped,
        content_key = %sanitized.content_key,
        "Upload accepted"
    );

    let dimensions = sanitized.upload.dimensions;
    Ok(Json(UploadResponse {
        ok: true,
        purpose,
        mime: sanitized.upload.mime,
        width: dimensions.map(|d| d.width),
        height: dimensions.map(|d| d.height),
        size: sanitized.bytes.len(),
        stripped: sanitized.stripped,
        content_key: sanitized.content_key,
    }))
}

fn reject(error: impl Into<GuardError>) -> Response {
    Rejection(error.into()).into_response()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
