//! Caching and synchronization layer for Skycast.
//!
//! [`WeatherRepository`] decides between the local cache and the provider,
//! [`SyncService`] refreshes stale places in the background with bounded
//! retry.

pub mod error;
pub mod freshness;
pub mod repository;
pub mod retry;
pub mod sync;
pub mod watch;

pub use error::{WeatherError, WeatherResult};
pub use freshness::{classify, CacheState, DEFAULT_TTL};
pub use repository::WeatherRepository;
pub use retry::{with_retry, RetryError, RetryPolicy};
pub use sync::{PlaceOutcome, SyncResult, SyncService, SyncState, OFFLINE_PROBE_INTERVAL};
pub use watch::{WeatherUpdate, WeatherWatch};
