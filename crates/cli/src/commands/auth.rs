//! Session commands.
//!
//! # Environment Variables
//!
//! - `WOODMOON_API_BASE_URL` - Backend the login request is sent to
//! - `WOODMOON_STORAGE_DIR` - Where the session is persisted

use secrecy::SecretString;
use woodmoon_core::Email;
use woodmoon_storefront::error::{AppError, Result};
use woodmoon_storefront::state::AppState;

use crate::telemetry;

/// Sign in and persist the returned session token.
///
/// # Errors
///
/// Returns an error if the email is malformed or the backend rejects the login.
pub async fn login(state: &AppState, email: &str, password: String) -> Result<()> {
    let email = Email::parse(email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let password = SecretString::from(password);

    tracing::info!("Signing in as {}...", email);
    state.sign_in(email.clone(), &password).await?;
    telemetry::sync_sentry_user(Some(&email));

    let cart = state.user_cart();
    tracing::info!(
        "Welcome back, {}! {} item(s) in cart",
        email.local_part(),
        cart.resolve().item_count()
    );
    Ok(())
}

/// Sign out. The cart is emptied along with the session.
pub fn logout(state: &AppState) {
    match state.auth().user() {
        Some(user) => {
            state.sign_out();
            telemetry::sync_sentry_user(None);
            tracing::info!("Signed out {}", user);
        }
        None => tracing::info!("Not signed in"),
    }
}

/// Report the signed-in user, if any.
pub fn whoami(state: &AppState) {
    match state.auth().user() {
        Some(user) => tracing::info!("Signed in as {} (cart key: {})", user, state.user_cart().key()),
        None => tracing::info!("Not signed in (cart key: {})", state.user_cart().key()),
    }
}
