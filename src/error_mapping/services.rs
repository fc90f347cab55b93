use skycast_core::{AppError, PlacesError};
use skycast_services::WeatherError as ServiceError;

use super::IntoAppError;

impl IntoAppError for ServiceError {
    fn into_app_error(self) -> AppError {
        match self {
            ServiceError::ProviderUnavailable(e) => e.into_app_error(),
            ServiceError::CapacityExceeded { max } => {
                AppError::Places(PlacesError::CapacityExceeded { max })
            }
            ServiceError::PlaceNotFound(id) => AppError::Places(PlacesError::NotFound(id)),
            ServiceError::Storage(e) => e.into_app_error(),
        }
    }
}
