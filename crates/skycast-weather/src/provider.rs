//! Weather provider boundary and its OpenWeatherMap implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::error::ProviderError;
use crate::mapping::{self, CurrentResponse, ForecastResponse, GeocodeEntry};
use crate::types::{Place, WeatherBundle};

/// Default number of candidates returned by a place search
pub const SEARCH_LIMIT: usize = 8;

/// Remote source of weather data.
///
/// Implementations return a fully populated bundle or a classified error;
/// they never return partial data.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch current, hourly and daily weather for a coordinate pair.
    async fn fetch_by_lat_lon(&self, lat: f64, lon: f64) -> Result<WeatherBundle, ProviderError>;

    /// Resolve a free-text query into candidate places.
    ///
    /// Fails with `ProviderError::NotFound` when nothing matches.
    async fn search_places(&self, query: &str, limit: usize)
        -> Result<Vec<Place>, ProviderError>;
}

/// OpenWeatherMap client (`/data/2.5` + `/geo/1.0`).
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl OpenWeatherProvider {
    /// Client against a custom endpoint (self-hosted proxy or test server).
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} returned {}: {}", path, status, body);
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), level = "info")]
    async fn fetch_by_lat_lon(&self, lat: f64, lon: f64) -> Result<WeatherBundle, ProviderError> {
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", "metric".to_string()),
        ];

        let (current, forecast) = tokio::try_join!(
            self.get_json::<CurrentResponse>("/data/2.5/weather", &query),
            self.get_json::<ForecastResponse>("/data/2.5/forecast", &query),
        )?;

        let bundle = mapping::map_bundle(&current, &forecast, lat, lon);
        tracing::debug!(
            "Fetched weather for {}: {} hourly, {} daily",
            bundle.place.name,
            bundle.hourly.len(),
            bundle.daily.len()
        );
        Ok(bundle)
    }

    #[instrument(skip(self), level = "info")]
    async fn search_places(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Place>, ProviderError> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        let entries: Vec<GeocodeEntry> = self.get_json("/geo/1.0/direct", &params).await?;

        if entries.is_empty() {
            return Err(ProviderError::NotFound(query.to_string()));
        }

        let mut places: Vec<Place> = Vec::with_capacity(entries.len());
        for place in entries.iter().map(mapping::map_search_result) {
            if !places.iter().any(|p| p.id == place.id) {
                places.push(place);
            }
        }
        places.truncate(limit);
        Ok(places)
    }
}
