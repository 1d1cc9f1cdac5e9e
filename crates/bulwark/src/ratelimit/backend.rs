//! Counter backend contract shared by the distributed and in-memory variants.

use async_trait::async_trait;
use bulwark_common::GuardError;

/// Which discipline a backend implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Redis sliding window, shared by every process
    Distributed,
    /// Per-process fixed window (development only)
    InMemory,
}

/// Result of one `increment_and_check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOutcome {
    pub admitted: bool,
    pub remaining: u32,
    /// End of the current window (Unix epoch millis)
    pub reset_at: i64,
}

/// Counts hits per key within a window.
///
/// Implementations must keep independent keys independent under
/// concurrent calls.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Record one hit against `key` and report whether it fits in `limit`
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<CounterOutcome, GuardError>;

    fn kind(&self) -> BackendKind;

    /// Liveness check used by readiness
    async fn ping(&self) -> Result<(), GuardError> {
        Ok(())
    }

    /// Drop state for windows that ended before `now`. Returns the number
    /// of keys removed; stores that expire keys themselves report 0.
    fn sweep(&self, _now: i64) -> usize {
        0
    }
}
