//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `WOODMOON_STORAGE_DIR` - Directory for durable client storage (default: `.woodmoon`)
//! - `WOODMOON_API_BASE_URL` - REST backend base URL (default: `http://localhost:8080/api`)
//! - `WOODMOON_REQUEST_TIMEOUT_SECS` - HTTP request timeout in seconds (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".woodmoon";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Directory holding the durable key-value snapshots
    pub storage_dir: PathBuf,
    /// Base URL of the REST backend, e.g. `http://localhost:8080/api`
    pub api_base_url: Url,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_dir = PathBuf::from(get_or_default(
            &lookup,
            "WOODMOON_STORAGE_DIR",
            DEFAULT_STORAGE_DIR,
        ));

        let api_base_url = parse_base_url(&get_or_default(
            &lookup,
            "WOODMOON_API_BASE_URL",
            DEFAULT_API_BASE_URL,
        ))?;

        let timeout_secs = get_or_default(
            &lookup,
            "WOODMOON_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("WOODMOON_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            storage_dir,
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_non_empty(&lookup, "SENTRY_DSN"),
            sentry_environment: get_non_empty(&lookup, "SENTRY_ENVIRONMENT"),
        })
    }

    /// Resolve an endpoint path (e.g. `auth/login`) against the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_base_url.join(path.trim_start_matches('/'))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable, treating empty values as unset.
fn get_non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_non_empty(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Parse the API base URL, forcing a trailing slash so relative joins keep the path prefix.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&with_slash).map_err(|e| {
        ConfigError::InvalidEnvVar("WOODMOON_API_BASE_URL".to_string(), e.to_string())
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "WOODMOON_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}
