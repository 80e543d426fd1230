//! Client-side stores.
//!
//! # Stores
//!
//! - [`AuthStore`] - signed-in identity and session token (key `"auth"`)
//! - [`CartStore`] - cart line items and hydration flag (key `"cart"`)
//! - [`UserCartResolver`] - per-identity cart key and saved-cart migration
//!
//! `AuthStore` comes first: the resolver reads the identity to build cart keys.

pub mod auth;
pub mod cart;
pub mod user_cart;

pub use auth::{AUTH_STORAGE_KEY, AuthState, AuthStore};
pub use cart::{CART_STORAGE_KEY, CartLineItem, CartSnapshot, CartState, CartStore, LineKey};
pub use user_cart::{GUEST_CART_KEY, UserCartResolver, cart_key};
