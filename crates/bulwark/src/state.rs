//! Application state and shared resources.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::csrf::CsrfGuard;
use crate::ratelimit::RateLimiter;
use crate::upload::UploadValidator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Per-category limiter; backends connect lazily on first use
    pub limiter: Arc<RateLimiter>,

    /// CSRF token issuer / validator
    pub csrf: CsrfGuard,

    /// Upload validation and metadata stripping
    pub uploads: UploadValidator,
}

impl AppState {
    /// Build state from configuration. Nothing connects here, so a
    /// missing store only surfaces when a limited request arrives.
    pub fn new(config: AppConfig) -> Self {
        let limiter = RateLimiter::new(config.posture, config.counter_store.clone());
        Self::from_parts(config, limiter, UploadValidator::default())
    }

    /// Assemble state around a prepared limiter and validator
    pub fn from_parts(config: AppConfig, limiter: RateLimiter, uploads: UploadValidator) -> Self {
        let csrf = CsrfGuard::new(config.csrf.secure_cookie, config.trust_proxy);

        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            csrf,
            uploads,
        }
    }
}
