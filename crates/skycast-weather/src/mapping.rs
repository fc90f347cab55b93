//! Wire format of the OpenWeatherMap API and its mapping to the domain model.
//!
//! Everything here is pure: the provider hands in decoded responses and gets
//! back a bundle whose hourly and daily series are ascending and bounded.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::types::{
    Place, WeatherBundle, WeatherCondition, WeatherDaily, WeatherHourly, WeatherNow, DAILY_LIMIT,
    HOURLY_LIMIT,
};

const MPS_TO_KPH: f64 = 3.6;

/// `GET /data/2.5/weather`
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub dt: i64,
    #[serde(default)]
    pub name: String,
    pub main: CurrentMain,
    #[serde(default)]
    pub weather: Vec<ConditionDto>,
    #[serde(default)]
    pub wind: WindDto,
}

#[derive(Debug, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindDto {
    /// Metres per second with `units=metric`
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionDto {
    pub id: i32,
    #[serde(default)]
    pub icon: String,
}

/// `GET /data/2.5/forecast` (3-hour steps)
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastSample {
    pub dt: i64,
    pub main: SampleMain,
    #[serde(default)]
    pub weather: Vec<ConditionDto>,
    pub rain: Option<VolumeDto>,
    pub snow: Option<VolumeDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleMain {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeDto {
    #[serde(rename = "3h", default)]
    pub three_hours: f64,
}

/// `GET /geo/1.0/direct` entry
#[derive(Debug, Deserialize)]
pub struct GeocodeEntry {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub state: Option<String>,
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn sample_icon(sample: &ForecastSample) -> String {
    sample
        .weather
        .first()
        .map(|w| w.icon.clone())
        .unwrap_or_default()
}

fn precipitation(sample: &ForecastSample) -> f64 {
    let rain = sample.rain.as_ref().map_or(0.0, |v| v.three_hours);
    let snow = sample.snow.as_ref().map_or(0.0, |v| v.three_hours);
    rain + snow
}

pub fn map_now(current: &CurrentResponse) -> WeatherNow {
    let condition = current.weather.first();
    WeatherNow {
        temp_c: current.main.temp,
        condition: condition
            .map(|c| WeatherCondition::from_owm_code(c.id))
            .unwrap_or_default(),
        icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
        humidity: current.main.humidity.min(100),
        wind_kph: current.wind.speed * MPS_TO_KPH,
        feels_like_c: current.main.feels_like,
        dt: timestamp(current.dt),
    }
}

/// First [`HOURLY_LIMIT`] samples in chronological order.
pub fn map_hourly(samples: &[ForecastSample]) -> Vec<WeatherHourly> {
    let mut sorted: Vec<&ForecastSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.dt);

    sorted
        .into_iter()
        .take(HOURLY_LIMIT)
        .map(|s| WeatherHourly {
            dt: timestamp(s.dt),
            temp_c: s.main.temp,
            icon: sample_icon(s),
            precip_mm: precipitation(s),
        })
        .collect()
}

/// Group samples by UTC calendar day, at most [`DAILY_LIMIT`] days.
///
/// The middle sample of each day supplies the representative icon.
pub fn map_daily(samples: &[ForecastSample]) -> Vec<WeatherDaily> {
    let mut days: BTreeMap<NaiveDate, Vec<&ForecastSample>> = BTreeMap::new();
    for sample in samples {
        days.entry(timestamp(sample.dt).date_naive())
            .or_default()
            .push(sample);
    }

    days.into_iter()
        .take(DAILY_LIMIT)
        .filter_map(|(date, mut day)| {
            day.sort_by_key(|s| s.dt);
            let middle = day.get(day.len() / 2)?;
            let min_c = day.iter().map(|s| s.main.temp_min).fold(f64::INFINITY, f64::min);
            let max_c = day
                .iter()
                .map(|s| s.main.temp_max)
                .fold(f64::NEG_INFINITY, f64::max);
            Some(WeatherDaily {
                dt: date.and_hms_opt(0, 0, 0)?.and_utc(),
                min_c,
                max_c,
                icon: sample_icon(middle),
            })
        })
        .collect()
}

pub fn map_bundle(
    current: &CurrentResponse,
    forecast: &ForecastResponse,
    lat: f64,
    lon: f64,
) -> WeatherBundle {
    let name = if current.name.is_empty() {
        format!("{:.2}, {:.2}", lat, lon)
    } else {
        current.name.clone()
    };

    WeatherBundle {
        now: map_now(current),
        hourly: map_hourly(&forecast.list),
        daily: map_daily(&forecast.list),
        place: Place::from_coordinates(name, lat, lon),
    }
}

pub fn map_search_result(entry: &GeocodeEntry) -> Place {
    let qualifier = entry.state.as_deref().or(entry.country.as_deref());
    let name = match qualifier {
        Some(q) if !q.is_empty() && q != entry.name => format!("{}, {}", entry.name, q),
        _ => entry.name.clone(),
    };
    Place::from_coordinates(name, entry.lat, entry.lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T00:00:00Z
    const DAY_ONE: i64 = 1_709_251_200;
    const THREE_HOURS: i64 = 3 * 3600;

    fn sample(dt: i64, temp: f64, icon: &str) -> ForecastSample {
        ForecastSample {
            dt,
            main: SampleMain {
                temp,
                temp_min: temp - 1.0,
                temp_max: temp + 1.0,
            },
            weather: vec![ConditionDto {
                id: 800,
                icon: icon.to_string(),
            }],
            rain: None,
            snow: None,
        }
    }

    fn five_days() -> Vec<ForecastSample> {
        (0..40)
            .map(|i| sample(DAY_ONE + i * THREE_HOURS, i as f64, &format!("i{}", i)))
            .collect()
    }

    #[test]
    fn test_hourly_is_ascending_and_bounded() {
        let mut samples = five_days();
        samples.reverse();

        let hourly = map_hourly(&samples);

        assert_eq!(hourly.len(), HOURLY_LIMIT);
        assert!(hourly.windows(2).all(|w| w[0].dt < w[1].dt));
        assert_eq!(hourly[0].dt.timestamp(), DAY_ONE);
    }

    #[test]
    fn test_daily_groups_by_utc_day() {
        let daily = map_daily(&five_days());

        assert_eq!(daily.len(), 5);
        assert!(daily.windows(2).all(|w| w[0].dt < w[1].dt));
        // Day one holds samples 0..8: temps 0..7
        assert_eq!(daily[0].min_c, -1.0);
        assert_eq!(daily[0].max_c, 8.0);
        assert_eq!(daily[0].dt.timestamp(), DAY_ONE);
    }

    #[test]
    fn test_daily_uses_middle_sample_icon() {
        let daily = map_daily(&five_days());
        // Eight samples per day; index 4 is the middle one
        assert_eq!(daily[0].icon, "i4");
        assert_eq!(daily[1].icon, "i12");
    }

    #[test]
    fn test_daily_is_capped() {
        let samples: Vec<ForecastSample> = (0..10)
            .map(|d| sample(DAY_ONE + d * 24 * 3600, 10.0, "01d"))
            .collect();
        assert_eq!(map_daily(&samples).len(), DAILY_LIMIT);
    }

    #[test]
    fn test_precipitation_sums_rain_and_snow() {
        let mut s = sample(DAY_ONE, 0.0, "13d");
        s.rain = Some(VolumeDto { three_hours: 0.5 });
        s.snow = Some(VolumeDto { three_hours: 1.25 });
        let hourly = map_hourly(&[s]);
        assert_eq!(hourly[0].precip_mm, 1.75);
    }

    #[test]
    fn test_map_now_converts_wind() {
        let current = CurrentResponse {
            dt: DAY_ONE,
            name: "Oslo".to_string(),
            main: CurrentMain {
                temp: 10.0,
                feels_like: 5.0,
                humidity: 80,
            },
            weather: vec![ConditionDto {
                id: 601,
                icon: "13d".to_string(),
            }],
            wind: WindDto { speed: 10.0 },
        };

        let now = map_now(&current);
        assert_eq!(now.wind_kph, 36.0);
        assert_eq!(now.condition, WeatherCondition::Snow);
        assert_eq!(now.temp_f(), 50.0);
        assert_eq!(now.feels_like_f(), 41.0);
    }

    #[test]
    fn test_search_result_name_and_id() {
        let place = map_search_result(&GeocodeEntry {
            name: "Portland".to_string(),
            lat: 45.5152,
            lon: -122.6784,
            country: Some("US".to_string()),
            state: Some("Oregon".to_string()),
        });
        assert_eq!(place.name, "Portland, Oregon");
        assert_eq!(place.id, "45.5152,-122.6784");
    }
}
