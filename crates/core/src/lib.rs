//! WoodMoon Core - Shared types library.
//!
//! This crate provides common types used across all WoodMoon components:
//! - `storefront` - Client-side state for the storefront (auth, cart, persistence)
//! - `cli` - Command-line front end over the storefront state
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and session tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
