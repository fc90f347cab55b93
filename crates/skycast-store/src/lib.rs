//! Local SQLite persistence for Skycast: saved places and cached weather.

pub mod db;
pub mod error;
pub mod places;
pub mod weather_cache;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use places::{PlaceRegistry, SavedPlace, MAX_PLACES};
pub use weather_cache::{CachedWeather, WeatherCacheStore};
