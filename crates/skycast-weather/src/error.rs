//! Provider and location error types.

use thiserror::Error;

/// Weather provider failures, classified by cause.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Request timed out")]
    Timeout,

    #[error("No connectivity: {0}")]
    NoConnectivity(String),

    #[error("Provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Classify a transport-level failure.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::NoConnectivity(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), &error.to_string())
        } else if error.is_decode() {
            Self::Unknown(format!("Invalid response: {}", error))
        } else {
            Self::Unknown(error.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::InvalidCredential,
            404 => Self::NotFound(body.to_string()),
            408 | 504 => Self::Timeout,
            _ => Self::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredential => "Weather API key is invalid. Check settings.".to_string(),
            Self::NotFound(_) => "Location not found".to_string(),
            Self::Timeout => "The weather service timed out.".to_string(),
            Self::NoConnectivity(_) => "Network error. Check your connection.".to_string(),
            Self::Unknown(msg) => format!("Weather service error: {}", msg),
        }
    }

    /// Whether another attempt could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NoConnectivity(_) | Self::Unknown(_))
    }
}

/// Location service errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
}
