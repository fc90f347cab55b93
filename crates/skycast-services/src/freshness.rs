//! Cache freshness decision.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default time-to-live for cached weather
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Freshness of a cached bundle relative to the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Cached and younger than the TTL
    Fresh,
    /// Cached but at or past the TTL, or a refresh was forced
    Stale,
    /// Nothing cached
    Absent,
}

impl CacheState {
    /// Whether the provider must be asked for new data.
    pub fn needs_fetch(self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Classify a cache entry written at `cached_at`.
///
/// An age exactly equal to `ttl` is stale. Timestamps in the future count
/// as age zero.
pub fn classify(
    cached_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    ttl: Duration,
    force_refresh: bool,
) -> CacheState {
    let Some(cached_at) = cached_at else {
        return CacheState::Absent;
    };
    if force_refresh {
        return CacheState::Stale;
    }

    let age = (now - cached_at).to_std().unwrap_or(Duration::ZERO);
    if age < ttl {
        CacheState::Fresh
    } else {
        CacheState::Stale
    }
}
