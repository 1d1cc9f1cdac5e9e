//! Tiered, category-aware rate limiting.
//!
//! A distributed Redis sliding window in production, an in-process fixed
//! window in development. The two disciplines are not equivalent under
//! bursts; the fallback is a convenience, not a substitute.

mod backend;
mod distributed;
mod identity;
mod limiter;
mod memory;

pub use backend::{BackendKind, CounterBackend, CounterOutcome};
pub use distributed::{DistributedSettings, RedisCounter};
pub use identity::{client_identity, route_category};
pub use limiter::RateLimiter;
pub use memory::MemoryCounter;
