//! Device location boundary.

use async_trait::async_trait;

use crate::error::LocationError;
use crate::geocode::ReverseGeocoder;
use crate::types::Place;

/// Best-effort source of the device's coordinates.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// `Ok(None)` when no location is available; errors only for unexpected failures.
    async fn current_lat_lon(&self) -> Result<Option<(f64, f64)>, LocationError>;
}

/// Location pinned in configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    pub lat: f64,
    pub lon: f64,
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_lat_lon(&self) -> Result<Option<(f64, f64)>, LocationError> {
        Ok(Some((self.lat, self.lon)))
    }
}

/// For hosts without a location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_lat_lon(&self) -> Result<Option<(f64, f64)>, LocationError> {
        Ok(None)
    }
}

/// Current coordinates, treating any failure as "no location".
pub async fn resolve_lat_lon(provider: &dyn LocationProvider) -> Option<(f64, f64)> {
    match provider.current_lat_lon().await {
        Ok(coords) => coords,
        Err(e) => {
            tracing::warn!("Location lookup failed, continuing without location: {}", e);
            None
        }
    }
}

/// The device location as a place, named by the reverse geocoder when possible.
pub async fn current_place(
    provider: &dyn LocationProvider,
    geocoder: Option<&ReverseGeocoder>,
) -> Option<Place> {
    let (lat, lon) = resolve_lat_lon(provider).await?;

    let name = match geocoder {
        Some(g) => g.name_for(lat, lon).await,
        None => None,
    }
    .unwrap_or_else(|| format!("{:.2}, {:.2}", lat, lon));

    Some(Place::from_coordinates(name, lat, lon))
}
