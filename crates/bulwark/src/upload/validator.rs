//! Upload validation pipeline.
//!
//! size → signature → purpose allow-list → dimensions, each stage able to
//! reject. Metadata stripping runs afterwards and never rejects.

use std::sync::Arc;

use axum::body::Bytes;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bulwark_common::{DetectedMime, Dimensions, GuardError, UploadPurpose, UploadRejection};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::codec::{CodecError, ImageCodec, ImageRsCodec, ReencodeOptions};
use super::sniff::sniff;

/// A payload that passed every check
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedUpload {
    pub purpose: UploadPurpose,
    pub mime: DetectedMime,
    pub size: usize,
    /// `None` when the codec could not read the header
    pub dimensions: Option<Dimensions>,
}

/// Validated payload after metadata stripping, ready for storage
#[derive(Debug, Clone)]
pub struct SanitizedUpload {
    pub upload: ValidatedUpload,
    pub bytes: Bytes,
    /// False when stripping failed and the original bytes were kept
    pub stripped: bool,
    /// URL-safe SHA-256 of `bytes`
    pub content_key: String,
}

#[derive(Clone)]
pub struct UploadValidator {
    codec: Arc<dyn ImageCodec>,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(Arc::new(ImageRsCodec))
    }
}

impl UploadValidator {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Run every rejecting stage against `bytes`
    pub async fn validate(
        &self,
        bytes: &Bytes,
        purpose: UploadPurpose,
    ) -> Result<ValidatedUpload, GuardError> {
        let mime = check_content(bytes, purpose)?;

        let dimensions = match self.read_dimensions(bytes.clone(), mime).await {
            Ok(dimensions) => {
                check_dimensions(dimensions, purpose)?;
                Some(dimensions)
            }
            Err(e) => {
                // Signature already matched; an opaque header is not itself a threat
                tracing::debug!(mime = %mime, purpose = %purpose, error = %e, "Dimension check skipped");
                None
            }
        };

        tracing::debug!(
            mime = %mime,
            purpose = %purpose,
            size = bytes.len(),
            dimensions = ?dimensions,
            "Upload accepted"
        );

        Ok(ValidatedUpload {
            purpose,
            mime,
            size: bytes.len(),
            dimensions,
        })
    }

    /// Re-encode without metadata. Returns the original bytes (and `false`)
    /// if the codec fails; the upload is never blocked here.
    pub async fn strip_metadata(&self, bytes: Bytes, mime: DetectedMime) -> (Bytes, bool) {
        let codec = self.codec.clone();
        let input = bytes.clone();

        let result = tokio::task::spawn_blocking(move || {
            codec.reencode(&input, mime, ReencodeOptions::default())
        })
        .await
        .map_err(|e| CodecError::Task(e.to_string()))
        .and_then(|inner| inner);

        match result {
            Ok(stripped) => (Bytes::from(stripped), true),
            Err(e) => {
                tracing::warn!(
                    target: "privacy",
                    mime = %mime,
                    size = bytes.len(),
                    error = %e,
                    "Metadata stripping failed; storing original bytes, which may carry EXIF/GPS data"
                );
                (bytes, false)
            }
        }
    }

    /// Validate, then strip, then derive the storage key
    pub async fn sanitize(
        &self,
        bytes: Bytes,
        purpose: UploadPurpose,
    ) -> Result<SanitizedUpload, GuardError> {
        let upload = self.validate(&bytes, purpose).await?;
        let (bytes, stripped) = self.strip_metadata(bytes, upload.mime).await;
        let content_key = content_key(&bytes);

        Ok(SanitizedUpload {
            upload,
            bytes,
            stripped,
            content_key,
        })
    }

    async fn read_dimensions(&self, bytes: Bytes, mime: DetectedMime) -> Result<Dimensions, CodecError> {
        let codec = self.codec.clone();
        tokio::task::spawn_blocking(move || codec.decode_metadata(&bytes, mime))
            .await
            .map_err(|e| CodecError::Task(e.to_string()))?
    }
}

/// Synchronous stages: emptiness, byte ceiling, signature, allow-list
pub fn check_content(bytes: &[u8], purpose: UploadPurpose) -> Result<DetectedMime, UploadRejection> {
    let policy = purpose.policy();

    if bytes.is_empty() {
        return Err(UploadRejection::Empty);
    }

    if bytes.len() > policy.max_bytes {
        return Err(UploadRejection::TooLarge {
            purpose,
            actual: bytes.len(),
            max: policy.max_bytes,
        });
    }

    let mime = sniff(bytes).ok_or(UploadRejection::Unrecognized)?;

    if !policy.allows(mime) {
        tracing::debug!(mime = %mime, purpose = %purpose, "Detected type not allowed for purpose");
        return Err(UploadRejection::DisallowedType {
            purpose,
            detected: mime,
        });
    }

    Ok(mime)
}

pub fn check_dimensions(dimensions: Dimensions, purpose: UploadPurpose) -> Result<(), UploadRejection> {
    let max = purpose.policy().max_dimensions;
    if dimensions.fits_within(max) {
        Ok(())
    } else {
        Err(UploadRejection::DimensionsExceeded {
            purpose,
            actual: dimensions,
            max,
        })
    }
}

pub fn content_key(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(bytes))
}
