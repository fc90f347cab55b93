//! Weather domain model and external capabilities for Skycast.
//!
//! Provides the place/weather value types, the OpenWeatherMap provider,
//! device location, reverse geocoding and network reachability.

pub mod connectivity;
pub mod error;
pub mod geocode;
pub mod location;
pub mod mapping;
pub mod provider;
pub mod types;

pub use connectivity::{ConnectivityObserver, HttpConnectivity, WatchConnectivity};
pub use error::{LocationError, ProviderError};
pub use geocode::ReverseGeocoder;
pub use location::{current_place, FixedLocation, LocationProvider, NoLocation};
pub use provider::{OpenWeatherProvider, WeatherProvider, SEARCH_LIMIT};
pub use types::*;
