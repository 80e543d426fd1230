//! Unified error handling.
//!
//! Store operations themselves cannot fail. Errors only arise while wiring
//! the application up (configuration, opening storage) or when talking to
//! the backend.

use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::LoginError;
use crate::storage::StorageError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable storage could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Signing in failed.
    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    /// Input from the user was rejected.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether the error points at a fault worth reporting, as opposed to
    /// something the user can fix (bad input, wrong password).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Storage(_) => true,
            Self::Login(err) => matches!(err, LoginError::Api { .. } | LoginError::Http(_)),
            Self::BadRequest(_) => false,
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("quantity must be a number".to_string());
        assert_eq!(err.to_string(), "Bad request: quantity must be a number");

        let err = AppError::from(LoginError::InvalidCredentials);
        assert_eq!(err.to_string(), "Login error: invalid email or password");
    }

    #[test]
    fn test_is_internal() {
        assert!(!AppError::BadRequest("x".to_string()).is_internal());
        assert!(!AppError::from(LoginError::InvalidCredentials).is_internal());
        assert!(!AppError::from(LoginError::EmptyToken).is_internal());
        assert!(
            AppError::from(LoginError::Api {
                status: 500,
                message: String::new(),
            })
            .is_internal()
        );
        assert!(AppError::from(StorageError::InvalidKey(String::new())).is_internal());
    }
}
