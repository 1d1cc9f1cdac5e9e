//! # Bulwark
//!
//! Trust-boundary guards for a content-publishing web service:
//! category-aware rate limiting, double-submit CSRF protection, and
//! upload content validation with metadata stripping.
//!
//! ## Request path
//! ```text
//! client → rate limit → CSRF → handler (upload validation)
//!              ↓
//!        Redis (counters)
//! ```

pub mod config;
pub mod csrf;
pub mod guard;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod upload;

pub use config::{AppConfig, ConfigOverrides};
pub use routes::create_router;
pub use state::AppState;
