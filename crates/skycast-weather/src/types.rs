use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of hourly entries in a bundle (24 hours at 3-hour resolution)
pub const HOURLY_LIMIT: usize = 8;

/// Maximum number of daily entries in a bundle
pub const DAILY_LIMIT: usize = 7;

/// Decimal places kept when deriving a place id from coordinates (~11 m)
const COORDINATE_ID_PRECISION: f64 = 10_000.0;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Deterministic place id for a coordinate pair.
///
/// Coordinates are rounded to four decimals so repeated searches of the same
/// location collapse to one place.
pub fn coordinate_id(lat: f64, lon: f64) -> String {
    // Adding 0.0 folds -0.0 into 0.0 so both hemispheres' zero share one id.
    let round = |v: f64| (v * COORDINATE_ID_PRECISION).round() / COORDINATE_ID_PRECISION + 0.0;
    format!("{:.4},{:.4}", round(lat), round(lon))
}

/// A named geographic coordinate registered for weather tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lat,
            lon,
        }
    }

    /// Place whose id is derived from its coordinates.
    pub fn from_coordinates(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self::new(coordinate_id(lat, lon), name, lat, lon)
    }
}

/// Weather condition categories mapped from provider condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_code(code: i32) -> Self {
        match code {
            200..=232 => Self::Thunderstorm,
            300..=321 => Self::Drizzle,
            500 | 501 | 520 => Self::Rain,
            502..=504 | 521 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            611..=616 => Self::Sleet,
            600..=602 | 620..=622 => Self::Snow,
            701..=781 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::HeavyRain => "cloud_rain",
            Self::Snow | Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }

    /// Stable storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Cloudy => "cloudy",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::HeavyRain => "heavy_rain",
            Self::Snow => "snow",
            Self::Sleet => "sleet",
            Self::Thunderstorm => "thunderstorm",
        }
    }
}

impl std::str::FromStr for WeatherCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear" => Ok(Self::Clear),
            "partly_cloudy" => Ok(Self::PartlyCloudy),
            "cloudy" => Ok(Self::Cloudy),
            "fog" => Ok(Self::Fog),
            "drizzle" => Ok(Self::Drizzle),
            "rain" => Ok(Self::Rain),
            "heavy_rain" => Ok(Self::HeavyRain),
            "snow" => Ok(Self::Snow),
            "sleet" => Ok(Self::Sleet),
            "thunderstorm" => Ok(Self::Thunderstorm),
            other => Err(format!("unknown weather condition: {}", other)),
        }
    }
}

/// Current conditions. Celsius values are authoritative; Fahrenheit is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherNow {
    pub temp_c: f64,
    pub condition: WeatherCondition,
    /// Provider icon code (e.g. `10d`)
    pub icon: String,
    pub humidity: u8,
    pub wind_kph: f64,
    pub feels_like_c: f64,
    pub dt: DateTime<Utc>,
}

impl WeatherNow {
    pub fn temp_f(&self) -> f64 {
        celsius_to_fahrenheit(self.temp_c)
    }

    pub fn feels_like_f(&self) -> f64 {
        celsius_to_fahrenheit(self.feels_like_c)
    }
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherHourly {
    pub dt: DateTime<Utc>,
    pub temp_c: f64,
    pub icon: String,
    pub precip_mm: f64,
}

impl WeatherHourly {
    pub fn temp_f(&self) -> f64 {
        celsius_to_fahrenheit(self.temp_c)
    }
}

/// Daily forecast entry, one per UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDaily {
    pub dt: DateTime<Utc>,
    pub min_c: f64,
    pub max_c: f64,
    pub icon: String,
}

impl WeatherDaily {
    pub fn min_f(&self) -> f64 {
        celsius_to_fahrenheit(self.min_c)
    }

    pub fn max_f(&self) -> f64 {
        celsius_to_fahrenheit(self.max_c)
    }
}

/// Complete weather data for one place at one fetch time.
///
/// Always stored and read as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub now: WeatherNow,
    pub hourly: Vec<WeatherHourly>,
    pub daily: Vec<WeatherDaily>,
    pub place: Place,
}

impl WeatherBundle {
    /// Same weather attributed to another place.
    pub fn for_place(mut self, place: &Place) -> Self {
        self.place = place.clone();
        self
    }
}
