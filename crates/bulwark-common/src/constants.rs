//! Shared constants for Bulwark components.

/// Default Bulwark HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Identity used when a request carries no usable client identity.
/// Anonymous traffic shares this single bucket.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Bytes inspected by the magic-byte sniffer
pub const SNIFF_WINDOW: usize = 16;

/// CSRF double-submit settings
pub mod csrf {
    /// Cookie carrying the server-issued token
    pub const COOKIE_NAME: &str = "csrf_token";

    /// Header the client echoes the token back in
    pub const HEADER_NAME: &str = "x-csrf-token";

    /// Cookie lifetime (1 day)
    pub const COOKIE_MAX_AGE_SECS: i64 = 86_400;

    /// Random bytes per token (before base64 encoding)
    pub const TOKEN_BYTES: usize = 32;
}

/// Redis key layout
pub mod redis_keys {
    /// Separator between the category prefix, the identity marker and the identity
    pub const SEPARATOR: char = ':';

    /// Marker segment for client-address identities: {prefix}:ip:{identity}
    pub const IP_SEGMENT: &str = "ip";
}

/// HTTP header names
pub mod headers {
    /// Seconds until the client may retry
    pub const RETRY_AFTER: &str = "retry-after";

    /// Hits left in the current window
    pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

    /// Proxy-supplied client chain (only honoured with trust_proxy)
    pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

    /// Proxy-supplied client address (only honoured with trust_proxy)
    pub const X_REAL_IP: &str = "x-real-ip";

    /// Proxy-supplied original scheme
    pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
}

/// Stable machine-readable error codes
pub mod codes {
    pub const INTERNAL: &str = "INTERNAL";
    pub const RATE_LIMIT_UNAVAILABLE: &str = "RATE_LIMIT_UNAVAILABLE";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const CSRF_INVALID: &str = "CSRF_INVALID";
    pub const UPLOAD_EMPTY: &str = "UPLOAD_EMPTY";
    pub const UPLOAD_TOO_LARGE: &str = "UPLOAD_TOO_LARGE";
    pub const UPLOAD_UNRECOGNIZED: &str = "UPLOAD_UNRECOGNIZED";
    pub const UPLOAD_TYPE_NOT_ALLOWED: &str = "UPLOAD_TYPE_NOT_ALLOWED";
    pub const UPLOAD_DIMENSIONS_EXCEEDED: &str = "UPLOAD_DIMENSIONS_EXCEEDED";
    pub const UPLOAD_UNKNOWN_PURPOSE: &str = "UPLOAD_UNKNOWN_PURPOSE";
    pub const NOT_FOUND: &str = "NOT_FOUND";
}
