//! Error taxonomy for the guard layer.
//!
//! Decision-level failures (rate limited, CSRF invalid, upload rejected)
//! are user-facing and carry a stable code. Configuration and backend
//! failures are logged in full and answered with a generic message.

use thiserror::Error;

use crate::constants::codes;
use crate::types::{DetectedMime, Dimensions, RateDecision, UploadPurpose};

/// Errors produced by the guards
#[derive(Debug, Error)]
pub enum GuardError {
    /// Guard cannot run safely with the current configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Distributed counter store failed; the check fails closed
    #[error("Counter backend error: {0}")]
    Backend(String),

    /// Caller exceeded its category's budget
    #[error("Rate limit exceeded for {category}")]
    RateLimited {
        category: &'static str,
        decision: RateDecision,
    },

    /// Double-submit token missing or mismatched
    #[error("CSRF token missing or invalid")]
    CsrfInvalid,

    /// Upload failed validation
    #[error(transparent)]
    UploadRejected(#[from] UploadRejection),
}

impl GuardError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration(_) => 500,
            Self::Backend(_) => 503,
            Self::RateLimited { .. } => 429,
            Self::CsrfInvalid => 403,
            Self::UploadRejected(rejection) => rejection.status_code(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => codes::INTERNAL,
            Self::Backend(_) => codes::RATE_LIMIT_UNAVAILABLE,
            Self::RateLimited { .. } => codes::RATE_LIMITED,
            Self::CsrfInvalid => codes::CSRF_INVALID,
            Self::UploadRejected(rejection) => rejection.code(),
        }
    }

    /// Message safe to show a client. Internal failures never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::Configuration(_) => "Internal server error".to_string(),
            Self::Backend(_) => "Service temporarily unavailable".to_string(),
            Self::RateLimited { .. } => "Too many requests, slow down".to_string(),
            Self::CsrfInvalid => "CSRF token missing or invalid".to_string(),
            Self::UploadRejected(rejection) => rejection.to_string(),
        }
    }

    /// True for failures the operator has to fix (logged at error level)
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Backend(_))
    }
}

/// Reasons an upload is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("File is {actual} bytes; the limit for {purpose} is {max} bytes")]
    TooLarge {
        purpose: UploadPurpose,
        actual: usize,
        max: usize,
    },

    #[error("Unrecognized file format")]
    Unrecognized,

    #[error("{detected} is not allowed for {purpose} uploads")]
    DisallowedType {
        purpose: UploadPurpose,
        detected: DetectedMime,
    },

    #[error("Image is {actual} pixels; the maximum for {purpose} is {max}")]
    DimensionsExceeded {
        purpose: UploadPurpose,
        actual: Dimensions,
        max: Dimensions,
    },

    #[error("Unknown upload purpose '{0}'")]
    UnknownPurpose(String),
}

impl UploadRejection {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TooLarge { .. } => 413,
            _ => 400,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => codes::UPLOAD_EMPTY,
            Self::TooLarge { .. } => codes::UPLOAD_TOO_LARGE,
            Self::Unrecognized => codes::UPLOAD_UNRECOGNIZED,
            Self::DisallowedType { .. } => codes::UPLOAD_TYPE_NOT_ALLOWED,
            Self::DimensionsExceeded { .. } => codes::UPLOAD_DIMENSIONS_EXCEEDED,
            Self::UnknownPurpose(_) => codes::UPLOAD_UNKNOWN_PURPOSE,
        }
    }
}

/// A string that names none of an enum's tags
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownTag {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GuardError::Configuration("x".into()).status_code(), 500);
        assert_eq!(GuardError::Backend("x".into()).status_code(), 503);
        assert_eq!(GuardError::CsrfInvalid.status_code(), 403);
        assert_eq!(
            GuardError::from(UploadRejection::TooLarge {
                purpose: UploadPurpose::Favicon,
                actual: 2,
                max: 1,
            })
            .status_code(),
            413
        );
        assert_eq!(GuardError::from(UploadRejection::Unrecognized).status_code(), 400);
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = GuardError::Configuration("REDIS_URL missing in production".into());
        assert!(err.is_internal());
        assert_eq!(err.code(), "INTERNAL");
        assert!(!err.public_message().contains("REDIS_URL"));
    }

    #[test]
    fn test_dimension_message_names_actual_and_max() {
        let rejection = UploadRejection::DimensionsExceeded {
            purpose: UploadPurpose::Favicon,
            actual: Dimensions::new(5000, 4096),
            max: Dimensions::new(4096, 4096),
        };
        let message = rejection.to_string();
        assert!(message.contains("5000x4096"));
        assert!(message.contains("4096x4096"));
        assert_eq!(rejection.code(), "UPLOAD_DIMENSIONS_EXCEEDED");
    }

    #[test]
    fn test_disallowed_type_surfaces_detected_mime() {
        let rejection = UploadRejection::DisallowedType {
            purpose: UploadPurpose::RegistrationAvatar,
            detected: DetectedMime::Gif,
        };
        assert!(rejection.to_string().contains("image/gif"));
    }
}
