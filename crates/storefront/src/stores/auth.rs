//! Signed-in identity store.
//!
//! Single source of truth for who is logged in. `user` and `token` are set
//! together by [`AuthStore::login`] and cleared together by
//! [`AuthStore::logout`]; a persisted snapshot holding only one of them is
//! discarded on load.
//!
//! Persisted under `"auth"` as `{"state": {"user", "token"}, "version": 0}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use woodmoon_core::{Email, SessionToken};

use crate::storage::Storage;
use crate::store::{PersistOptions, PersistedStore, Subscription};

/// Storage key of the auth snapshot.
pub const AUTH_STORAGE_KEY: &str = "auth";

/// Auth store state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    user: Option<Email>,
    #[serde(default)]
    token: Option<SessionToken>,
}

impl AuthState {
    #[must_use]
    pub const fn user(&self) -> Option<&Email> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    const fn is_consistent(&self) -> bool {
        self.user.is_some() == self.token.is_some()
    }
}

/// Observable, persisted store of the signed-in identity.
#[derive(Debug, Clone)]
pub struct AuthStore {
    store: PersistedStore<AuthState>,
}

impl AuthStore {
    /// A logged-out store persisting into `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            store: PersistedStore::new(
                AuthState::default(),
                storage,
                PersistOptions::new(AUTH_STORAGE_KEY),
            ),
        }
    }

    /// Create the store and restore the persisted identity, if any.
    #[must_use]
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let auth = Self::new(storage);
        if let Some(persisted) = auth.store.load_persisted() {
            if persisted.is_consistent() {
                tracing::debug!(logged_in = persisted.is_logged_in(), "Restored auth state");
                auth.store.set(|state| *state = persisted);
            } else {
                tracing::warn!("Discarding persisted auth state with user/token mismatch");
            }
        }
        auth
    }

    /// Record a successful sign-in, replacing any previous identity.
    ///
    /// Credentials are validated by the backend before this is called.
    pub fn login(&self, email: Email, token: SessionToken) {
        tracing::info!(user = %email, "Signed in");
        self.store.set(move |state| {
            state.user = Some(email);
            state.token = Some(token);
        });
    }

    /// Forget the signed-in identity. Calling it while logged out is harmless.
    pub fn logout(&self) {
        if let Some(user) = self.user() {
            tracing::info!(user = %user, "Signed out");
        }
        self.store.set(|state| *state = AuthState::default());
    }

    /// The signed-in user's email.
    #[must_use]
    pub fn user(&self) -> Option<Email> {
        self.store.with(|state| state.user.clone())
    }

    /// The session token issued at login.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        self.store.with(|state| state.token.clone())
    }

    /// Both halves of the identity, or nothing.
    #[must_use]
    pub fn identity(&self) -> Option<(Email, SessionToken)> {
        self.store
            .with(|state| state.user.clone().zip(state.token.clone()))
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.store.with(AuthState::is_logged_in)
    }

    /// Register a listener called with `(new, previous)` after every change.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(
        &self,
        listener: impl Fn(&AuthState, &AuthState) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(listener)
    }
}
