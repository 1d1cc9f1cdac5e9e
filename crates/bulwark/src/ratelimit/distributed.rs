//! Distributed sliding-window counter on Redis.
//!
//! Each key is split into window-sized buckets. A hit is admitted while
//! `floor(previous * (1 - elapsed / window)) + current < limit`, so the
//! previous bucket's weight decays continuously instead of resetting at
//! bucket boundaries. The check and the increment run in one Lua script,
//! which serializes concurrent hits on the same key.

use async_trait::async_trait;
use bulwark_common::GuardError;
use redis::aio::ConnectionManager;
use redis::{IntoConnectionInfo, Script};
use serde::Deserialize;

use super::backend::{BackendKind, CounterBackend, CounterOutcome};

/// KEYS[1] = current bucket, KEYS[2] = previous bucket
/// ARGV = limit, now (ms), window (ms)
/// Returns remaining hits, or -1 when denied.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local current = tonumber(redis.call("GET", KEYS[1]) or "0")
local previous = tonumber(redis.call("GET", KEYS[2]) or "0")
local limit = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local window = tonumber(ARGV[3])

local elapsed = (now % window) / window
local weighted = math.floor((1 - elapsed) * previous)

if weighted + current >= limit then
    return -1
end

local updated = redis.call("INCR", KEYS[1])
if updated == 1 then
    redis.call("PEXPIRE", KEYS[1], window * 2 + 1000)
end

return limit - (updated + weighted)
"#;

/// Connection parameters for the distributed store. Both are opaque.
#[derive(Clone, Deserialize)]
pub struct DistributedSettings {
    /// `redis://` or `rediss://` URL
    pub endpoint: String,
    /// Password / access token, if the endpoint does not embed one
    #[serde(default)]
    pub credential: Option<String>,
}

impl std::fmt::Debug for DistributedSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedSettings")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Bucket keys and window end for a hit at `now`
#[derive(Debug, Clone, PartialEq, Eq)]
struct WindowKeys {
    current: String,
    previous: String,
    reset_at: i64,
}

fn window_keys(key: &str, window_ms: i64, now: i64) -> WindowKeys {
    let bucket = now / window_ms;
    WindowKeys {
        current: format!("{key}:{bucket}"),
        previous: format!("{key}:{}", bucket - 1),
        reset_at: (bucket + 1) * window_ms,
    }
}

fn outcome_from_script(raw: i64, reset_at: i64) -> CounterOutcome {
    if raw < 0 {
        CounterOutcome {
            admitted: false,
            remaining: 0,
            reset_at,
        }
    } else {
        CounterOutcome {
            admitted: true,
            remaining: u32::try_from(raw).unwrap_or(u32::MAX),
            reset_at,
        }
    }
}

/// Sliding-window counter on one dedicated Redis connection
pub struct RedisCounter {
    /// Auto-reconnecting connection
    conn: ConnectionManager,
    script: Script,
}

impl RedisCounter {
    /// Open a connection to the distributed store
    pub async fn connect(settings: &DistributedSettings) -> Result<Self, GuardError> {
        let mut info = settings
            .endpoint
            .as_str()
            .into_connection_info()
            .map_err(|e| GuardError::Configuration(format!("invalid counter store endpoint: {e}")))?;

        if let Some(credential) = &settings.credential {
            info.redis.password = Some(credential.clone());
        }

        let client = redis::Client::open(info)
            .map_err(|e| GuardError::Configuration(format!("failed to create Redis client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| GuardError::Backend(format!("failed to connect to Redis: {e}")))?;

        Ok(Self {
            conn,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        })
    }
}

impl RedisCounter {
    /// Record a hit at `now` (Unix epoch millis)
    pub async fn hit_at(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
        now: i64,
    ) -> Result<CounterOutcome, GuardError> {
        let window_ms = (window_secs as i64 * 1000).max(1);
        let keys = window_keys(key, window_ms, now);

        let mut conn = self.conn.clone();
        let raw: i64 = self
            .script
            .key(&keys.current)
            .key(&keys.previous)
            .arg(limit)
            .arg(now)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| GuardError::Backend(format!("sliding window script failed: {e}")))?;

        Ok(outcome_from_script(raw, keys.reset_at))
    }
}

#[async_trait]
impl CounterBackend for RedisCounter {
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window_secs: u64,
    ) -> Result<CounterOutcome, GuardError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.hit_at(key, limit, window_secs, now).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Distributed
    }

    async fn ping(&self) -> Result<(), GuardError> {
        let mut conn = self.conn.clone();
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result
            .map(|_| ())
            .map_err(|e| GuardError::Backend(format!("Redis ping failed: {e}")))
    }
}
