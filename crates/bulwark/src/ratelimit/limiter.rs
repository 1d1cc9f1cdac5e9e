//! Per-category rate limiter facade.

use std::sync::Arc;

use bulwark_common::constants::{UNKNOWN_IDENTITY, redis_keys};
use bulwark_common::{GuardError, RateCategory, RateDecision, RuntimePosture};
use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::backend::{BackendKind, CounterBackend};
use super::distributed::{DistributedSettings, RedisCounter};
use super::memory::MemoryCounter;

type BackendCell = Arc<OnceCell<Arc<dyn CounterBackend>>>;

/// Applies category policies against lazily created counter backends.
///
/// Every category owns its own backend (its own Redis connection on the
/// distributed path), created on first use and kept for the life of the
/// limiter. Backend resolution only contends per category.
pub struct RateLimiter {
    posture: RuntimePosture,
    distributed: Option<DistributedSettings>,
    backends: DashMap<RateCategory, BackendCell>,
}

impl RateLimiter {
    pub fn new(posture: RuntimePosture, distributed: Option<DistributedSettings>) -> Self {
        Self {
            posture,
            distributed,
            backends: DashMap::new(),
        }
    }

    /// Install a backend for one category ahead of first use
    pub fn with_backend(self, category: RateCategory, backend: Arc<dyn CounterBackend>) -> Self {
        self.backends
            .insert(category, Arc::new(OnceCell::new_with(Some(backend))));
        self
    }

    pub fn posture(&self) -> RuntimePosture {
        self.posture
    }

    /// Record one hit for `identity` under `category`.
    ///
    /// Fails closed: a production limiter without a distributed store, or a
    /// store that errors, returns `Err` rather than admitting the hit.
    pub async fn check(
        &self,
        identity: &str,
        category: RateCategory,
    ) -> Result<RateDecision, GuardError> {
        let policy = category.policy();
        let identity = normalize_identity(identity);
        let backend = self.backend_for(category).await?;
        let key = counter_key(backend.kind(), policy.key_prefix, identity);

        let outcome = backend
            .increment_and_check(&key, policy.limit, policy.window_secs)
            .await?;

        let decision = RateDecision {
            ok: outcome.admitted,
            remaining: if outcome.admitted { outcome.remaining } else { 0 },
            reset_at: outcome.reset_at,
        };

        if decision.ok {
            tracing::trace!(
                category = %category,
                identity = %identity,
                remaining = decision.remaining,
                "Rate limit check admitted"
            );
        } else {
            tracing::debug!(
                category = %category,
                identity = %identity,
                reset_at = decision.reset_at,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Like `check`, but a denial becomes `GuardError::RateLimited`
    pub async fn enforce(
        &self,
        identity: &str,
        category: RateCategory,
    ) -> Result<RateDecision, GuardError> {
        let decision = self.check(identity, category).await?;
        if decision.ok {
            Ok(decision)
        } else {
            Err(GuardError::RateLimited {
                category: category.as_str(),
                decision,
            })
        }
    }

    /// Resolve `category`'s backend and ping it
    pub async fn ping(&self, category: RateCategory) -> Result<(), GuardError> {
        self.backend_for(category).await?.ping().await
    }

    /// Sweep every backend created so far; returns keys removed
    pub fn sweep(&self) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        self.backends
            .iter()
            .filter_map(|entry| entry.value().get().map(|backend| backend.sweep(now)))
            .sum()
    }

    async fn backend_for(&self, category: RateCategory) -> Result<Arc<dyn CounterBackend>, GuardError> {
        // Clone the cell out so the map shard is not held across the await
        let cell = self
            .backends
            .entry(category)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let backend = cell
            .get_or_try_init(|| self.create_backend(category))
            .await?;

        Ok(backend.clone())
    }

    async fn create_backend(&self, category: RateCategory) -> Result<Arc<dyn CounterBackend>, GuardError> {
        match (&self.distributed, self.posture) {
            (Some(settings), _) => {
                let counter = RedisCounter::connect(settings).await?;
                tracing::info!(category = %category, "Distributed rate limit backend connected");
                Ok(Arc::new(counter))
            }
            (None, RuntimePosture::Production) => {
                tracing::error!(
                    category = %category,
                    "No distributed rate limit store configured in production; refusing requests"
                );
                Err(GuardError::Configuration(
                    "rate limiting requires a distributed counter store in production".to_string(),
                ))
            }
            (None, RuntimePosture::Development) => {
                tracing::warn!(
                    category = %category,
                    "Using in-memory rate limit counter (development only, not shared across processes)"
                );
                Ok(Arc::new(MemoryCounter::new()))
            }
        }
    }
}

/// Empty identities share the single "unknown" bucket
fn normalize_identity(identity: &str) -> &str {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTITY
    } else {
        trimmed
    }
}

fn counter_key(kind: BackendKind, prefix: &str, identity: &str) -> String {
    let sep = redis_keys::SEPARATOR;
    match kind {
        BackendKind::Distributed => {
            format!("{prefix}{sep}{}{sep}{identity}", redis_keys::IP_SEGMENT)
        }
        BackendKind::InMemory => format!("{prefix}{sep}{identity}"),
    }
}
