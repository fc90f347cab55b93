//! Maps crate errors to skycast_core::AppError for consistent user-facing messages.
//! Each source crate has its own module to keep mappings small and readable.

mod provider;
mod services;
mod store;

use skycast_core::AppError;

/// Conversion into the application error hierarchy.
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

pub trait ResultExt<T> {
    /// Map the error side into [`AppError`].
    fn app_err(self) -> Result<T, AppError>;
}

impl<T, E: IntoAppError> ResultExt<T> for Result<T, E> {
    fn app_err(self) -> Result<T, AppError> {
        self.map_err(IntoAppError::into_app_error)
    }
}
