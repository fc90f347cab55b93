//! Reverse geocoding: convert coordinates to human-readable place names.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("Skycast/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// "Seattle, Washington"; city > town > village > ... > country.
    fn display_name(self) -> Option<String> {
        let state = self.state.clone();
        let country = self.country.clone();

        let place = self
            .city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.state_district)
            .or(self.county)
            .or(self.state)
            .or(self.country)?;

        let suffix = [state, country]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty() && *s != place);

        Some(match suffix {
            Some(s) => format!("{}, {}", place, s),
            None => place,
        })
    }
}

/// Nominatim reverse geocoder.
#[derive(Debug, Clone)]
pub struct ReverseGeocoder {
    client: Client,
    url: String,
}

impl ReverseGeocoder {
    pub fn with_url(url: &str) -> Option<Self> {
        match Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
        {
            Ok(client) => Some(Self {
                client,
                url: url.to_string(),
            }),
            Err(e) => {
                tracing::warn!("Failed to create geocoding client: {}", e);
                None
            }
        }
    }

    /// Returns `None` on failure or timeout; the caller falls back to coordinates.
    pub async fn name_for(&self, lat: f64, lon: f64) -> Option<String> {
        let response = match self
            .client
            .get(&self.url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Reverse geocode request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Reverse geocode returned status {}", response.status());
            return None;
        }

        let body: NominatimResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Reverse geocode parse error: {}", e);
                return None;
            }
        };

        let name = body.address?.display_name()?;
        tracing::info!("Reverse geocoded to: {}", name);
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_name_prefers_city_with_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .mount(&server)
            .await;

        let geocoder = ReverseGeocoder::with_url(&server.uri()).unwrap();
        let name = geocoder.name_for(47.6062, -122.3321).await;
        assert_eq!(name.as_deref(), Some("Seattle, Washington"));
    }

    #[tokio::test]
    async fn test_name_falls_back_to_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": { "village": "Hallstatt", "country": "Austria" }
            })))
            .mount(&server)
            .await;

        let geocoder = ReverseGeocoder::with_url(&server.uri()).unwrap();
        assert_eq!(
            geocoder.name_for(47.56, 13.64).await.as_deref(),
            Some("Hallstatt, Austria")
        );
    }

    #[tokio::test]
    async fn test_error_status_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let geocoder = ReverseGeocoder::with_url(&server.uri()).unwrap();
        assert!(geocoder.name_for(0.0, 0.0).await.is_none());
    }
}
