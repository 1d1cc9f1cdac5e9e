//! Upload content validation.
//!
//! Formats are identified from magic bytes only, checked against the
//! purpose's allow-list and dimension ceiling, then re-encoded to drop
//! EXIF/GPS metadata before storage.

mod codec;
mod sniff;
mod validator;

pub use codec::{CodecError, ImageCodec, ImageRsCodec, ReencodeOptions};
pub use sniff::sniff;
pub use validator::{
    SanitizedUpload, UploadValidator, ValidatedUpload, check_content, check_dimensions,
    content_key,
};
