//! Per-identity cart keys and snapshot migration.
//!
//! Each identity has a cart key, `cart_<email>` or `cart_guest`. The cart
//! store itself always persists under the shared `"cart"` key; identity keys
//! are only ever read here. When a snapshot exists under the current
//! identity's key and the cart has not hydrated yet, the resolver loads it
//! through [`CartStore::hydrate`]. At startup this only happens when the
//! shared `"cart"` key holds no usable snapshot, so a saved identity cart is
//! migrated once and the shared key wins from then on.

use std::sync::Arc;

use woodmoon_core::Email;

use super::auth::AuthStore;
use super::cart::{CartLineItem, CartSnapshot, CartStore};
use crate::storage::Storage;

/// Key prefix of identity-scoped cart snapshots.
const CART_KEY_PREFIX: &str = "cart_";

/// Cart key used when nobody is signed in.
pub const GUEST_CART_KEY: &str = "cart_guest";

/// The identity-scoped cart key for `user`.
#[must_use]
pub fn cart_key(user: Option<&Email>) -> String {
    user.map_or_else(
        || GUEST_CART_KEY.to_string(),
        |email| format!("{CART_KEY_PREFIX}{email}"),
    )
}

/// Combines the auth and cart stores into the cart view of the current identity.
#[derive(Clone)]
pub struct UserCartResolver {
    auth: AuthStore,
    cart: CartStore,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for UserCartResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCartResolver")
            .field("key", &self.key())
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

impl UserCartResolver {
    #[must_use]
    pub const fn new(auth: AuthStore, cart: CartStore, storage: Arc<dyn Storage>) -> Self {
        Self {
            auth,
            cart,
            storage,
        }
    }

    /// The cart key of the currently signed-in identity.
    #[must_use]
    pub fn key(&self) -> String {
        cart_key(self.auth.user().as_ref())
    }

    /// Return the live cart, first migrating the identity's saved snapshot
    /// into it if the cart has not hydrated yet.
    ///
    /// Missing, unreadable or unrecognised snapshots leave the cart as is.
    pub fn resolve(&self) -> &CartStore {
        if !self.cart.has_hydrated() {
            let key = self.key();
            if let Some(items) = self.saved_items(&key) {
                tracing::debug!(key = %key, items = items.len(), "Migrating saved cart");
                self.cart.hydrate(CartSnapshot::from(items));
            }
        }
        &self.cart
    }

    /// The auth store this resolver keys on.
    #[must_use]
    pub const fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn saved_items(&self, key: &str) -> Option<Vec<CartLineItem>> {
        let raw = match self.storage.get_item(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Cannot read saved cart");
                return None;
            }
        };

        let value: serde_json::Value = serde_json::from_str(&raw)
            .inspect_err(|e| tracing::debug!(key = %key, error = %e, "Saved cart is not JSON"))
            .ok()?;

        let cart = value.pointer("/state/cart")?;
        serde_json::from_value(cart.clone())
            .inspect_err(|e| tracing::debug!(key = %key, error = %e, "Saved cart has no usable items"))
            .ok()
    }
}
