//! Repository and sync error types.

use skycast_store::StoreError;
use skycast_weather::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Weather provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    #[error("Saved place limit reached ({max})")]
    CapacityExceeded { max: usize },

    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for WeatherError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CapacityExceeded { max } => Self::CapacityExceeded { max },
            StoreError::PlaceNotFound(id) => Self::PlaceNotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl WeatherError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderUnavailable(e) => e.user_message(),
            Self::CapacityExceeded { max } => {
                format!("You can save up to {} places. Remove one first.", max)
            }
            Self::PlaceNotFound(_) => "Place not found".to_string(),
            Self::Storage(e) => e.user_message(),
        }
    }

    /// Only transient provider failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type WeatherResult<T> = Result<T, WeatherError>;
