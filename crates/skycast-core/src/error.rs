//! Centralized error types for the Skycast application.
//!
//! Crate-level errors (provider, store, services) are mapped into this
//! hierarchy at the binary edge so every failure has:
//! - a precise variant for handling
//! - a user-friendly message for display
//! - the full underlying context for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Saved places error: {0}")]
    Places(#[from] PlacesError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Places(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Weather provider errors, classified by cause.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Request timed out")]
    Timeout,

    #[error("No network connection")]
    Offline,

    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Device location unavailable")]
    LocationUnavailable,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
            WeatherError::LocationNotFound(_) => "Location not found. Check and try again.",
            WeatherError::Timeout => "The weather service timed out. Please try again.",
            WeatherError::Offline => "No network connection. Showing saved data if available.",
            WeatherError::ApiError(_) => "Weather service error. Please try again.",
            WeatherError::LocationUnavailable => {
                "Current location is unavailable. Add a place by name instead."
            }
        }
    }
}

/// Saved place registry errors.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Saved place limit reached ({max})")]
    CapacityExceeded { max: usize },

    #[error("Place not found: {0}")]
    NotFound(String),
}

impl PlacesError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PlacesError::CapacityExceeded { .. } => {
                "You have saved the maximum number of places. Remove one first."
            }
            PlacesError::NotFound(_) => "That place is not in your saved places.",
        }
    }
}

/// Database/storage errors (SQLite, local state).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => {
                "Unable to access local data. Try restarting the app."
            }
            DatabaseError::QueryFailed(_) => "A data operation failed. Please try again.",
            DatabaseError::Corruption(_) => {
                "Local data may be corrupted. Consider deleting the weather database."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err: AppError = PlacesError::CapacityExceeded { max: 10 }.into();
        assert!(matches!(
            err,
            AppError::Places(PlacesError::CapacityExceeded { max: 10 })
        ));
    }

    #[test]
    fn test_user_message_propagation() {
        let err = AppError::Weather(WeatherError::InvalidApiKey);
        assert_eq!(err.user_message(), "Weather API key is invalid. Check settings.");
    }

    #[test]
    fn test_display_keeps_context() {
        let err = AppError::Weather(WeatherError::LocationNotFound("Atlantis".into()));
        assert!(err.to_string().contains("Atlantis"));
    }
}
