//! Shared fakes for service tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use skycast_services::WeatherRepository;
use skycast_store::Database;
use skycast_weather::{
    Place, ProviderError, WeatherBundle, WeatherCondition, WeatherDaily, WeatherHourly,
    WeatherNow, WeatherProvider,
};
use tokio::time::Instant;

pub fn sample_bundle(place: &Place, temp_c: f64) -> WeatherBundle {
    let dt = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    WeatherBundle {
        now: WeatherNow {
            temp_c,
            condition: WeatherCondition::PartlyCloudy,
            icon: "02d".into(),
            humidity: 55,
            wind_kph: 9.0,
            feels_like_c: temp_c - 1.0,
            dt,
        },
        hourly: (0..8)
            .map(|i| WeatherHourly {
                dt: dt + chrono::Duration::hours(3 * i),
                temp_c: temp_c + i as f64,
                icon: "02d".into(),
                precip_mm: 0.0,
            })
            .collect(),
        daily: (0..5)
            .map(|i| WeatherDaily {
                dt: dt + chrono::Duration::days(i),
                min_c: temp_c - 4.0,
                max_c: temp_c + 4.0,
                icon: "02d".into(),
            })
            .collect(),
        place: place.clone(),
    }
}

type Scripted = Result<f64, ProviderError>;

/// Provider returning scripted results, then `fallback` forever.
///
/// `Ok(temp)` produces [`sample_bundle`] at that temperature.
pub struct MockProvider {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    search_results: Vec<Place>,
}

impl MockProvider {
    pub fn always(result: Scripted) -> Arc<Self> {
        Self::scripted(Vec::new(), result)
    }

    pub fn scripted(script: Vec<Scripted>, fallback: Scripted) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            search_results: Vec::new(),
        })
    }

    pub fn with_search_results(results: Vec<Place>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(20.0),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            search_results: results,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    async fn fetch_by_lat_lon(&self, lat: f64, lon: f64) -> Result<WeatherBundle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());

        let next = self.script.lock().pop_front();
        let result = next.unwrap_or_else(|| self.fallback.clone());
        result.map(|temp_c| sample_bundle(&Place::from_coordinates("Provider", lat, lon), temp_c))
    }

    async fn search_places(&self, query: &str, limit: usize) -> Result<Vec<Place>, ProviderError> {
        if self.search_results.is_empty() {
            return Err(ProviderError::NotFound(query.to_string()));
        }
        Ok(self.search_results.iter().take(limit).cloned().collect())
    }
}

pub fn place(id: &str) -> Place {
    Place::new(id, format!("Place {}", id), 47.6, -122.3)
}

pub fn repository(provider: Arc<MockProvider>) -> WeatherRepository {
    repository_with_db(provider).0
}

/// Repository plus its database, for tests that tamper with rows.
pub fn repository_with_db(provider: Arc<MockProvider>) -> (WeatherRepository, Database) {
    let db = Database::in_memory().unwrap();
    (WeatherRepository::new(db.clone(), provider), db)
}
