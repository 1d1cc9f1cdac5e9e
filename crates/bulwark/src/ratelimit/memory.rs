//! In-process fixed-window counter.
//!
//! Development fallback only: state is per process, and windows reset
//! abruptly at `reset_at` instead of decaying like the distributed path.

use async_trait::async_trait;
use bulwark_common::GuardError;
use dashmap::DashMap;

use super::backend::{BackendKind, CounterBackend, CounterOutcome};

/// One key's window
#[derive(Debug, Clone, Copy)]
struct CounterRecord {
    count: u32,
    reset_at: i64,
}

/// Fixed-window counter table keyed by `prefix:identity`
#[derive(Debug, Default)]
pub struct MemoryCounter {
    records: DashMap<String, CounterRecord>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit at `now` (Unix epoch millis)
    pub fn hit_at(&self, key: &str, limit: u32, window_secs: u64, now: i64) -> CounterOutcome {
        let window_ms = window_secs as i64 * 1000;

        // The entry guard holds the shard lock for this key only
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert(CounterRecord {
                count: 0,
                reset_at: now + window_ms,
            });

        // Expired windows are replaced, not merged
        if record.count == 0 || now >= record.reset_at {
            *record = CounterRecord {
                count: 1,
                reset_at: now + window_ms,
            };
            return CounterOutcome {
                admitted: limit > 0,
                remaining: limit.saturating_sub(1),
                reset_at: record.reset_at,
            };
        }

        if record.count >= limit {
            return CounterOutcome {
                admitted: false,
                remaining: 0,
                reset_at: record.reset_at,
            };
        }

        record.count += 1;
        CounterOutcome {
            admitted: true,
            remaining: limit.saturating_sub(record.count),
            reset_at: record.reset_at,
        }
    }

    /// Drop windows that ended before `now`
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.reset_at > now);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CounterBackend for MemoryCounter {
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<CounterOutcome, GuardError> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(self.hit_at(key, limit, window_secs, now))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    fn sweep(&self, now: i64) -> usize {
        self.purge_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_hit_opens_window() {
        let counter = MemoryCounter::new();
        let outcome = counter.hit_at("rl:auth:a", 10, 300, 1_000);
        assert!(outcome.admitted);
        assert_eq!(outcome.remaining, 9);
        assert_eq!(outcome.reset_at, 301_000);
    }

    #[test]
    fn test_denies_once_limit_reached() {
        let counter = MemoryCounter::new();
        for i in 0..3 {
            let outcome = counter.hit_at("k", 3, 60, 1_000 + i);
            assert!(outcome.admitted, "hit {i} should be admitted");
        }
        let denied = counter.hit_at("k", 3, 60, 2_000);
        assert!(!denied.admitted);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, 61_000);
    }

    #[test]
    fn test_remaining_never_increases_within_window() {
        let counter = MemoryCounter::new();
        let mut last = u32::MAX;
        for i in 0..20 {
            let outcome = counter.hit_at("k", 5, 60, i);
            assert!(outcome.remaining <= last);
            last = outcome.remaining;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_expired_window_is_replaced() {
        let counter = MemoryCounter::new();
        for _ in 0..4 {
            counter.hit_at("k", 2, 10, 0);
        }
        // Exactly at reset_at the old window is gone
        let outcome = counter.hit_at("k", 2, 10, 10_000);
        assert!(outcome.admitted);
        assert_eq!(outcome.remaining, 1);
        assert_eq!(outcome.reset_at, 20_000);
    }

    #[test]
    fn test_keys_are_independent() {
        let counter = MemoryCounter::new();
        counter.hit_at("a", 1, 60, 0);
        assert!(!counter.hit_at("a", 1, 60, 1).admitted);
        assert!(counter.hit_at("b", 1, 60, 1).admitted);
    }

    #[test]
    fn test_purge_expired() {
        let counter = MemoryCounter::new();
        counter.hit_at("old", 5, 1, 0);
        counter.hit_at("new", 5, 60, 0);
        assert_eq!(counter.purge_expired(5_000), 1);
        assert_eq!(counter.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identities_do_not_interfere() {
        let counter = Arc::new(MemoryCounter::new());
        let mut handles = Vec::new();

        for id in 0..16 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("rl:write:{id}");
                let mut admitted = 0;
                for _ in 0..25 {
                    if counter.increment_and_check(&key, 10, 60).await.unwrap().admitted {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 10);
        }
    }
}
