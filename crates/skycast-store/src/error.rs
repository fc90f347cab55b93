//! Storage error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Saved place limit reached ({max})")]
    CapacityExceeded { max: usize },

    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::CapacityExceeded { max } => {
                format!("You can save up to {} places. Remove one first.", max)
            }
            Self::PlaceNotFound(_) => "Place not found".to_string(),
            Self::Database(_) | Self::Task(_) => "Local storage error".to_string(),
            Self::Corrupt(_) => "Local weather data is corrupted".to_string(),
            Self::Io(_) => "Unable to create the local database".to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert!(StoreError::CapacityExceeded { max: 10 }.user_message().contains("10"));
        assert_eq!(StoreError::PlaceNotFound("p1".into()).user_message(), "Place not found");
    }
}
