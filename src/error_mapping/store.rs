use skycast_core::{AppError, DatabaseError, PlacesError};
use skycast_store::StoreError;

use super::IntoAppError;

impl IntoAppError for StoreError {
    fn into_app_error(self) -> AppError {
        match self {
            StoreError::CapacityExceeded { max } => {
                AppError::Places(PlacesError::CapacityExceeded { max })
            }
            StoreError::PlaceNotFound(id) => AppError::Places(PlacesError::NotFound(id)),
            StoreError::Database(e) => AppError::Database(DatabaseError::QueryFailed(e.to_string())),
            StoreError::Corrupt(s) => AppError::Database(DatabaseError::Corruption(s)),
            StoreError::Io(e) => AppError::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StoreError::Task(s) => AppError::Database(DatabaseError::QueryFailed(s)),
        }
    }
}
