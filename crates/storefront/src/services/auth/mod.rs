//! Backend login client.
//!
//! `POST <api>/auth/login` with `{"email", "password"}`. A successful
//! response body is the raw bearer token; 401 means bad credentials.

mod error;

pub use error::LoginError;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::instrument;
use url::Url;
use woodmoon_core::{Email, SessionToken};

use crate::config::StorefrontConfig;

/// Login endpoint, relative to the API base URL.
const LOGIN_PATH: &str = "auth/login";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client for the backend's authentication endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    login_url: Url,
}

impl AuthClient {
    /// Create a new login client.
    ///
    /// # Errors
    ///
    /// Returns error if the login URL is invalid or the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, LoginError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            login_url: config.endpoint(LOGIN_PATH)?,
        })
    }

    /// Exchange an email and password for a session token.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::InvalidCredentials` on 401, `LoginError::Api` on
    /// any other non-success status, `LoginError::EmptyToken` if the body is
    /// blank, and `LoginError::Http` if the request fails.
    #[instrument(skip(self, password), fields(user = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SessionToken, LoginError> {
        let body = LoginRequest {
            email: email.as_str(),
            password: password.expose_secret(),
        };

        let response = self
            .client
            .post(self.login_url.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("Login rejected");
            return Err(LoginError::InvalidCredentials);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Login failed");
            return Err(LoginError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token = response.text().await?;
        let token = token.trim();
        if token.is_empty() {
            return Err(LoginError::EmptyToken);
        }

        Ok(SessionToken::new(token))
    }
}
