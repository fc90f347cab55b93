use skycast_core::{AppError, WeatherError};
use skycast_weather::ProviderError;

use super::IntoAppError;

impl IntoAppError for ProviderError {
    fn into_app_error(self) -> AppError {
        let e = match self {
            ProviderError::InvalidCredential => WeatherError::InvalidApiKey,
            ProviderError::NotFound(s) => WeatherError::LocationNotFound(s),
            ProviderError::Timeout => WeatherError::Timeout,
            ProviderError::NoConnectivity(_) => WeatherError::Offline,
            ProviderError::Unknown(s) => WeatherError::ApiError(s),
        };
        AppError::Weather(e)
    }
}
