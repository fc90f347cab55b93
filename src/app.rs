//! Application composition root.
//!
//! Owns the single database handle and wires the provider, connectivity
//! and location capabilities into the repository and sync service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use skycast_core::{AppError, Config, WeatherError};
use skycast_services::{PlaceOutcome, RetryPolicy, SyncResult, SyncService, WeatherRepository};
use skycast_store::{Database, SavedPlace};
use skycast_weather::{
    current_place, ConnectivityObserver, FixedLocation, HttpConnectivity, LocationProvider,
    NoLocation, OpenWeatherProvider, Place, ReverseGeocoder, WatchConnectivity, WeatherBundle,
    WeatherProvider,
};
use tokio_util::sync::CancellationToken;

use crate::error_mapping::ResultExt;

pub struct App {
    config: Config,
    repository: WeatherRepository,
    sync: SyncService,
    location: Arc<dyn LocationProvider>,
    geocoder: Option<ReverseGeocoder>,
    cancel: CancellationToken,
}

impl App {
    /// Build the production graph from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let db_path = config.database_path();
        let db = Database::open(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        let api_key = config.provider.api_key.clone().unwrap_or_else(|| {
            tracing::warn!("No OpenWeatherMap API key configured; network fetches will fail");
            String::new()
        });
        let timeout = Duration::from_secs(config.provider.request_timeout_secs);
        let provider = OpenWeatherProvider::with_options(api_key, &config.provider.base_url, timeout)
            .context("Failed to create weather provider")?;

        let connectivity: Arc<dyn ConnectivityObserver> =
            match HttpConnectivity::new(config.provider.connectivity_probe_url.clone()) {
                Ok(probe) => Arc::new(probe),
                Err(e) => {
                    tracing::warn!("Connectivity probe unavailable, assuming online: {}", e);
                    Arc::new(WatchConnectivity::new(true))
                }
            };

        let location: Arc<dyn LocationProvider> = match config.location.coordinates() {
            Some((lat, lon)) => Arc::new(FixedLocation { lat, lon }),
            None => Arc::new(NoLocation),
        };
        let geocoder = ReverseGeocoder::with_url(&config.provider.reverse_geocode_url);

        Ok(Self::with_parts(
            config,
            db,
            Arc::new(provider),
            connectivity,
            location,
            geocoder,
        ))
    }

    /// Build from explicit capabilities (tests, embedding).
    pub fn with_parts(
        config: Config,
        db: Database,
        provider: Arc<dyn WeatherProvider>,
        connectivity: Arc<dyn ConnectivityObserver>,
        location: Arc<dyn LocationProvider>,
        geocoder: Option<ReverseGeocoder>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let ttl = Duration::from_secs(u64::from(config.cache.ttl_minutes) * 60);
        let repository = WeatherRepository::new(db, provider).with_ttl(ttl);
        let sync = SyncService::new(repository.clone(), connectivity)
            .with_retry_policy(RetryPolicy::new(config.sync.max_attempts, config.sync.backoff_ms))
            .with_cancellation(cancel.clone());

        Self {
            config,
            repository,
            sync,
            location,
            geocoder,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The device (or configured) location as a place.
    pub async fn current_place(&self) -> Option<Place> {
        let mut place = current_place(self.location.as_ref(), self.geocoder.as_ref()).await?;
        if let Some(name) = &self.config.location.name {
            place.name = name.clone();
        }
        Some(place)
    }

    /// On first run, save the current location so there is a primary place.
    ///
    /// Returns the added place, or `None` when this is not the first run,
    /// places already exist or no location is known.
    pub async fn ensure_default_place(&self) -> Result<Option<Place>, AppError> {
        if !self.repository.claim_first_run().await.app_err()? {
            return Ok(None);
        }
        if !self.repository.saved_places().await.app_err()?.is_empty() {
            return Ok(None);
        }

        let Some(place) = self.current_place().await else {
            tracing::info!("No saved places and no location; waiting for the user to add one");
            return Ok(None);
        };

        tracing::info!("Adding default place {} ({})", place.name, place.id);
        self.repository.add_place(place.clone()).await.app_err()?;
        Ok(Some(place))
    }

    // =========== Facade ===========

    pub async fn saved_places(&self) -> Result<Vec<SavedPlace>, AppError> {
        self.repository.saved_places().await.app_err()
    }

    pub async fn add_place(&self, place: Place) -> Result<(), AppError> {
        self.repository.add_place(place).await.app_err()
    }

    pub async fn remove_place(&self, id: &str) -> Result<bool, AppError> {
        self.repository.remove_place(id).await.app_err()
    }

    pub async fn set_primary(&self, id: &str) -> Result<(), AppError> {
        self.repository.set_primary(id).await.app_err()
    }

    pub async fn search_places(&self, query: &str) -> Result<Vec<Place>, AppError> {
        self.repository.search_places(query).await.app_err()
    }

    /// Resolve a saved place by id, or the primary place when `id` is `None`.
    pub async fn resolve_place(&self, id: Option<&str>) -> Result<Option<Place>, AppError> {
        let saved = match id {
            Some(id) => self.repository.place(id).await.app_err()?,
            None => self.repository.primary_place().await.app_err()?,
        };
        Ok(saved.map(|s| s.place))
    }

    pub async fn weather_for(&self, place: &Place, force_refresh: bool) -> Result<WeatherBundle, AppError> {
        self.repository.weather_for(place, force_refresh).await.app_err()
    }

    pub async fn weather_or_stale(&self, place: &Place, force_refresh: bool) -> Result<WeatherBundle, AppError> {
        self.repository.weather_or_stale(place, force_refresh).await.app_err()
    }

    pub async fn sync_all(&self, force: bool) -> Result<SyncResult, AppError> {
        self.sync.sync_all(force).await.app_err()
    }

    pub async fn sync_place(&self, place: &Place, force: bool) -> Result<PlaceOutcome, AppError> {
        self.sync.sync_place(place, force).await.app_err()
    }

    /// Run periodic sync until [`App::shutdown`] is called.
    pub async fn run_sync_loop(&self) -> Result<(), AppError> {
        let minutes = self.config.sync.interval_minutes;
        if minutes == 0 {
            return Err(AppError::Config(skycast_core::ConfigError::Invalid(
                "sync.interval_minutes is 0; periodic sync is disabled".into(),
            )));
        }
        let interval = Duration::from_secs(u64::from(minutes) * 60);
        self.sync.run_periodic(interval, self.cancel.child_token()).await;
        Ok(())
    }

    /// Cancel in-flight syncs and the periodic loop.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.cancel.cancel();
    }
}

/// Error for commands that need a location when none is known.
pub fn location_unavailable() -> AppError {
    AppError::Weather(WeatherError::LocationUnavailable)
}
