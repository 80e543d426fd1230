//! Login error types.

use thiserror::Error;

/// Errors that can occur while signing in against the backend.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The backend answered with an unexpected status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The backend accepted the login but sent no token.
    #[error("login succeeded but no token was returned")]
    EmptyToken,

    /// The login URL could not be built.
    #[error("invalid login URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
