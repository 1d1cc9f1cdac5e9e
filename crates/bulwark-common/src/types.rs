//! Core types shared across Bulwark components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownTag;

const MIB: usize = 1024 * 1024;

/// Deployment posture, decided once at startup.
///
/// - `Production`: a distributed counter store is mandatory; without one
///   every rate-limit check fails closed.
/// - `Development`: an in-process counter stands in for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimePosture {
    #[default]
    Production,
    Development,
}

impl RuntimePosture {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for RuntimePosture {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" => Ok(Self::Development),
            other => Err(UnknownTag::new("runtime posture", other)),
        }
    }
}

/// Abuse category a route belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateCategory {
    /// Login, registration, password reset
    Auth,
    /// Generic content mutation
    Write,
    /// File uploads
    Upload,
    /// Public comment submission
    Comment,
    /// Mutations under the admin area
    AdminWrite,
}

impl RateCategory {
    pub const ALL: [RateCategory; 5] = [
        Self::Auth,
        Self::Write,
        Self::Upload,
        Self::Comment,
        Self::AdminWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Write => "write",
            Self::Upload => "upload",
            Self::Comment => "comment",
            Self::AdminWrite => "admin-write",
        }
    }

    /// The single, immutable policy bound to this category
    pub fn policy(&self) -> RatePolicy {
        match self {
            Self::Auth => RatePolicy::new(10, 300, "rl:auth"),
            Self::Write => RatePolicy::new(60, 60, "rl:write"),
            Self::Upload => RatePolicy::new(20, 600, "rl:upload"),
            Self::Comment => RatePolicy::new(5, 60, "rl:comment"),
            Self::AdminWrite => RatePolicy::new(120, 60, "rl:admin-write"),
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateCategory {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownTag::new("rate category", s))
    }
}

/// Limit and window for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatePolicy {
    /// Hits admitted per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Counter key prefix
    pub key_prefix: &'static str,
}

impl RatePolicy {
    const fn new(limit: u32, window_secs: u64, key_prefix: &'static str) -> Self {
        Self {
            limit,
            window_secs,
            key_prefix,
        }
    }

    pub fn window_millis(&self) -> i64 {
        self.window_secs as i64 * 1000
    }
}

/// Outcome of a single rate-limit check. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    /// Whether the hit was admitted
    pub ok: bool,
    /// Hits left in the current window (never negative)
    pub remaining: u32,
    /// When the current window ends (Unix epoch millis)
    pub reset_at: i64,
}

impl RateDecision {
    /// Seconds a denied caller should wait: `max(1, ceil((reset_at - now) / 1000))`
    pub fn retry_after_secs(&self, now_millis: i64) -> u64 {
        let delta = (self.reset_at - now_millis).max(0) as u64;
        delta.div_ceil(1000).max(1)
    }
}

/// Magic-byte classification result. Client-declared types never produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/webp")]
    WebP,
    #[serde(rename = "image/x-icon")]
    Ico,
    #[serde(rename = "image/avif")]
    Avif,
}

impl DetectedMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Ico => "image/x-icon",
            Self::Avif => "image/avif",
        }
    }

    /// Formats that may carry more than one frame
    pub fn may_be_animated(&self) -> bool {
        matches!(self, Self::Gif | Self::WebP)
    }
}

impl fmt::Display for DetectedMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when neither side exceeds `max`
    pub fn fits_within(&self, max: Dimensions) -> bool {
        self.width <= max.width && self.height <= max.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What an uploaded file is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadPurpose {
    Avatar,
    RegistrationAvatar,
    Favicon,
    Banner,
    AlbumPhoto,
    General,
}

impl UploadPurpose {
    pub const ALL: [UploadPurpose; 6] = [
        Self::Avatar,
        Self::RegistrationAvatar,
        Self::Favicon,
        Self::Banner,
        Self::AlbumPhoto,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::RegistrationAvatar => "registration-avatar",
            Self::Favicon => "favicon",
            Self::Banner => "banner",
            Self::AlbumPhoto => "album-photo",
            Self::General => "general",
        }
    }

    pub fn policy(&self) -> UploadPolicy {
        use DetectedMime::*;

        match self {
            Self::Avatar => UploadPolicy {
                allowed: &[Jpeg, Png, WebP, Gif],
                max_bytes: 5 * MIB,
                max_dimensions: Dimensions::new(4096, 4096),
            },
            Self::RegistrationAvatar => UploadPolicy {
                allowed: &[Jpeg, Png, WebP],
                max_bytes: 2 * MIB,
                max_dimensions: Dimensions::new(4096, 4096),
            },
            Self::Favicon => UploadPolicy {
                allowed: &[Png, Ico, Jpeg, WebP, Gif],
                max_bytes: MIB,
                max_dimensions: Dimensions::new(4096, 4096),
            },
            Self::Banner => UploadPolicy {
                allowed: &[Jpeg, Png, WebP, Avif],
                max_bytes: 10 * MIB,
                max_dimensions: Dimensions::new(8192, 4096),
            },
            Self::AlbumPhoto => UploadPolicy {
                allowed: &[Jpeg, Png, WebP, Gif, Avif],
                max_bytes: 20 * MIB,
                max_dimensions: Dimensions::new(8192, 8192),
            },
            Self::General => UploadPolicy {
                allowed: &[Jpeg, Png, WebP, Gif, Avif, Ico],
                max_bytes: 10 * MIB,
                max_dimensions: Dimensions::new(8192, 8192),
            },
        }
    }

    /// Largest byte ceiling across all purposes (request body limit)
    pub fn max_body_bytes() -> usize {
        Self::ALL
            .iter()
            .map(|p| p.policy().max_bytes)
            .max()
            .unwrap_or(MIB)
    }
}

impl fmt::Display for UploadPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadPurpose {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownTag::new("upload purpose", s))
    }
}

/// Static upload policy for one purpose
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub allowed: &'static [DetectedMime],
    pub max_bytes: usize,
    pub max_dimensions: Dimensions,
}

impl UploadPolicy {
    pub fn allows(&self, mime: DetectedMime) -> bool {
        self.allowed.contains(&mime)
    }
}
