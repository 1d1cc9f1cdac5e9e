//! # Bulwark Common
//!
//! Shared types, error taxonomy, and constants for the Bulwark guard layer.
//!
//! ## Modules
//! - `types` - Categories, policies, decisions, upload purposes
//! - `error` - Guard error taxonomy with stable codes
//! - `constants` - Cookie/header names, key layout, error codes

pub mod constants;
pub mod error;
pub mod types;

pub use error::{GuardError, UploadRejection};
pub use types::*;
