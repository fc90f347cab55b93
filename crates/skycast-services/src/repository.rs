//! Cache-or-fetch weather access and the place registry facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use skycast_store::{CachedWeather, Database, PlaceRegistry, SavedPlace, WeatherCacheStore};
use skycast_weather::{Place, WeatherBundle, WeatherProvider, SEARCH_LIMIT};
use tokio::sync::broadcast;

use crate::error::{WeatherError, WeatherResult};
use crate::freshness::{classify, CacheState, DEFAULT_TTL};
use crate::watch::{WeatherUpdate, WeatherWatch, UPDATE_CHANNEL_CAPACITY};

/// Serves weather from the local cache while it is fresh and from the
/// provider otherwise. Cheap to clone.
#[derive(Clone)]
pub struct WeatherRepository {
    registry: PlaceRegistry,
    cache: WeatherCacheStore,
    provider: Arc<dyn WeatherProvider>,
    ttl: Duration,
    updates: broadcast::Sender<WeatherUpdate>,
}

impl std::fmt::Debug for WeatherRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherRepository")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl WeatherRepository {
    pub fn new(db: Database, provider: Arc<dyn WeatherProvider>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            registry: PlaceRegistry::new(db.clone()),
            cache: WeatherCacheStore::new(db),
            provider,
            ttl: DEFAULT_TTL,
            updates,
        }
    }

    /// Override the cache time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &WeatherCacheStore {
        &self.cache
    }

    /// Weather for `place`, from cache when younger than the TTL.
    ///
    /// With `force_refresh` the cache is not read at all. A provider failure
    /// is returned as `ProviderUnavailable` and never replaced by stale
    /// data; the cache record is left untouched.
    #[tracing::instrument(skip(self, place), fields(place_id = %place.id))]
    pub async fn weather_for(&self, place: &Place, force_refresh: bool) -> WeatherResult<WeatherBundle> {
        if force_refresh {
            tracing::debug!("Forced refresh for {}", place.id);
            return self.refresh(place).await;
        }

        let state = self.cache_state(&place.id).await?;
        if state == CacheState::Fresh {
            // Removed between the two reads: fall through to a fetch
            if let Some(cached) = self.cache.get(&place.id).await? {
                tracing::debug!("Cache hit for {}", place.id);
                return Ok(cached.bundle);
            }
        }

        tracing::debug!("Cache {:?} for {}, fetching", state, place.id);
        self.refresh(place).await
    }

    /// Fresh weather, or the stored bundle when the provider is unavailable.
    ///
    /// Storage and registry errors still propagate. Fails with the provider
    /// error when nothing is cached.
    pub async fn weather_or_stale(&self, place: &Place, force_refresh: bool) -> WeatherResult<WeatherBundle> {
        match self.weather_for(place, force_refresh).await {
            Err(WeatherError::ProviderUnavailable(cause)) => match self.cache.get(&place.id).await? {
                Some(cached) => {
                    tracing::warn!(
                        "Serving stale weather for {} cached at {}: {}",
                        place.id,
                        cached.cached_at,
                        cause
                    );
                    Ok(cached.bundle)
                }
                None => Err(WeatherError::ProviderUnavailable(cause)),
            },
            other => other,
        }
    }

    /// Fetch from the provider and overwrite the cache. One attempt.
    pub async fn refresh(&self, place: &Place) -> WeatherResult<WeatherBundle> {
        let bundle = self
            .provider
            .fetch_by_lat_lon(place.lat, place.lon)
            .await?
            .for_place(place);

        if self.cache.put(&bundle, &place.id).await? {
            self.publish(&place.id, Some(bundle.clone()));
        } else {
            tracing::debug!("Place {} is not saved, weather not cached", place.id);
        }
        Ok(bundle)
    }

    /// Freshness of the cached bundle for `place_id`.
    pub async fn cache_state(&self, place_id: &str) -> WeatherResult<CacheState> {
        let cached_at = self.cache.cached_at(place_id).await?;
        Ok(classify(cached_at, Utc::now(), self.ttl, false))
    }

    pub async fn cached(&self, place_id: &str) -> WeatherResult<Option<CachedWeather>> {
        Ok(self.cache.get(place_id).await?)
    }

    /// Subscribe to cached weather for `place_id`.
    pub async fn watch(&self, place_id: &str) -> WeatherResult<WeatherWatch> {
        // Subscribe before reading so a write in between is not lost
        let rx = self.updates.subscribe();
        let initial = self.cache.get(place_id).await?.map(|c| c.bundle);
        Ok(WeatherWatch::new(place_id.to_string(), initial, rx))
    }

    fn publish(&self, place_id: &str, bundle: Option<WeatherBundle>) {
        // No receivers is not an error
        let _ = self.updates.send(WeatherUpdate {
            place_id: place_id.to_string(),
            bundle: bundle.map(Arc::new),
        });
    }

    // =========== Place registry ===========

    pub async fn saved_places(&self) -> WeatherResult<Vec<SavedPlace>> {
        Ok(self.registry.list().await?)
    }

    pub async fn place(&self, id: &str) -> WeatherResult<Option<SavedPlace>> {
        Ok(self.registry.get(id).await?)
    }

    pub async fn primary_place(&self) -> WeatherResult<Option<SavedPlace>> {
        Ok(self.registry.primary().await?)
    }

    pub async fn add_place(&self, place: Place) -> WeatherResult<()> {
        Ok(self.registry.add(place).await?)
    }

    /// Returns `false` when no such place was saved.
    ///
    /// Watchers of the place see its weather go away.
    pub async fn remove_place(&self, id: &str) -> WeatherResult<bool> {
        let removed = self.registry.remove(id).await?;
        if removed {
            self.publish(id, None);
        }
        Ok(removed)
    }

    pub async fn set_primary(&self, id: &str) -> WeatherResult<()> {
        Ok(self.registry.set_primary(id).await?)
    }

    /// `true` the first time it is called against this database.
    pub async fn claim_first_run(&self) -> WeatherResult<bool> {
        Ok(self.registry.claim_first_run().await?)
    }

    /// Search the provider for places matching `query`.
    pub async fn search_places(&self, query: &str) -> WeatherResult<Vec<Place>> {
        Ok(self.provider.search_places(query, SEARCH_LIMIT).await?)
    }
}
