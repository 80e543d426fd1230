//! Application state owned by the front end's root.
//!
//! There are no global stores: the root builds one `AppState` at startup
//! and passes it by reference (or cheap clone) to every view.

use std::sync::Arc;

use secrecy::SecretString;
use woodmoon_core::Email;

use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::services::auth::AuthClient;
use crate::storage::{FileStorage, Storage};
use crate::stores::{AuthStore, CartStore, UserCartResolver};

/// Application state shared across views.
///
/// This struct is cheaply cloneable via `Arc`; every clone sees the same
/// stores.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    storage: Arc<dyn Storage>,
    auth: AuthStore,
    cart: CartStore,
    auth_client: AuthClient,
}

impl AppState {
    /// Open the state persisted in the configured storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// login client cannot be built.
    pub fn open(config: StorefrontConfig) -> Result<Self> {
        let storage = FileStorage::open(&config.storage_dir)?;
        Self::with_storage(config, Arc::new(storage))
    }

    /// Build the state on top of an arbitrary storage backend.
    ///
    /// Initialization order: the auth store is restored first, then the cart
    /// hydrates from the shared `"cart"` key. Only when that key holds no
    /// usable snapshot is the identity's saved cart migrated in.
    ///
    /// # Errors
    ///
    /// Returns an error if the login client cannot be built.
    pub fn with_storage(config: StorefrontConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let auth = AuthStore::open(Arc::clone(&storage));
        let cart = CartStore::new(Arc::clone(&storage));

        if !cart.hydrate_from_storage() {
            UserCartResolver::new(auth.clone(), cart.clone(), Arc::clone(&storage)).resolve();
            cart.finish_hydration();
        }

        let auth_client = AuthClient::new(&config)?;
        tracing::debug!(
            logged_in = auth.is_logged_in(),
            cart_lines = cart.line_count(),
            "Application state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                auth,
                cart,
                auth_client,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the shared storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// Get a reference to the auth store.
    #[must_use]
    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// The cart resolver for the current identity.
    #[must_use]
    pub fn user_cart(&self) -> UserCartResolver {
        UserCartResolver::new(
            self.inner.auth.clone(),
            self.inner.cart.clone(),
            Arc::clone(&self.inner.storage),
        )
    }

    /// Sign in against the backend and record the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the credentials or cannot be reached.
    pub async fn sign_in(&self, email: Email, password: &SecretString) -> Result<()> {
        let token = self.inner.auth_client.login(&email, password).await?;
        self.inner.auth.login(email, token);
        Ok(())
    }

    /// Sign out and empty the cart.
    pub fn sign_out(&self) {
        self.inner.auth.logout();
        self.inner.cart.clear_cart();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use woodmoon_core::{ProductId, SessionToken};

    use super::*;
    use crate::storage::MemoryStorage;
    use crate::stores::{CART_STORAGE_KEY, CartLineItem, GUEST_CART_KEY};

    fn config() -> StorefrontConfig {
        StorefrontConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_clones_share_stores() {
        let state = AppState::with_storage(config(), Arc::new(MemoryStorage::new())).unwrap();
        let other = state.clone();

        state
            .cart()
            .add_to_cart(CartLineItem::new(ProductId::new(1), "Bench", Decimal::TEN));
        assert_eq!(other.cart().line_count(), 1);
        assert!(other.cart().has_hydrated());
    }

    #[test]
    fn test_sign_out_clears_identity_and_cart() {
        let state = AppState::with_storage(config(), Arc::new(MemoryStorage::new())).unwrap();
        state.auth().login(
            Email::parse("a@x.com").unwrap(),
            SessionToken::new("tok1"),
        );
        state
            .cart()
            .add_to_cart(CartLineItem::new(ProductId::new(1), "Bench", Decimal::TEN));

        state.sign_out();
        assert!(!state.auth().is_logged_in());
        assert!(state.cart().is_empty());
    }

    #[test]
    fn test_shared_key_wins_over_saved_identity_cart() {
        let storage = MemoryStorage::new();
        storage
            .set_item(GUEST_CART_KEY, r#"{"state":{"cart":[{"id":2}]},"version":0}"#)
            .unwrap();
        storage
            .set_item(
                CART_STORAGE_KEY,
                r#"{"state":{"cart":[{"id":9}],"hasHydrated":true},"version":0}"#,
            )
            .unwrap();

        let state = AppState::with_storage(config(), Arc::new(storage)).unwrap();
        let ids: Vec<i64> = state.cart().items().iter().map(|l| l.id.as_i64()).collect();
        assert_eq!(ids, vec![9]);
    }

    #[test]
    fn test_migrated_cart_keeps_changes_across_restart() {
        let storage = MemoryStorage::new();
        storage
            .set_item(GUEST_CART_KEY, r#"{"state":{"cart":[{"id":2}]},"version":0}"#)
            .unwrap();

        let state = AppState::with_storage(config(), Arc::new(storage.clone())).unwrap();
        state
            .cart()
            .add_to_cart(CartLineItem::new(ProductId::new(5), "Lamp", Decimal::TEN));
        let before: Vec<i64> = state.cart().items().iter().map(|l| l.id.as_i64()).collect();
        assert_eq!(before, vec![2, 5]);

        let state = AppState::with_storage(config(), Arc::new(storage)).unwrap();
        let after: Vec<i64> = state.cart().items().iter().map(|l| l.id.as_i64()).collect();
        assert_eq!(after, vec![2, 5]);
    }

    #[test]
    fn test_restart_restores_state() {
        let storage = MemoryStorage::new();
        {
            let state = AppState::with_storage(config(), Arc::new(storage.clone())).unwrap();
            state.auth().login(
                Email::parse("a@x.com").unwrap(),
                SessionToken::new("tok1"),
            );
            state.cart().add_to_cart(
                CartLineItem::new(ProductId::new(4), "Shelf", Decimal::TEN).with_quantity(2),
            );
        }

        let state = AppState::with_storage(config(), Arc::new(storage)).unwrap();
        assert_eq!(state.auth().user().unwrap().as_str(), "a@x.com");
        assert_eq!(state.cart().item_count(), 2);
        assert_eq!(state.user_cart().key(), "cart_a@x.com");
    }
}
