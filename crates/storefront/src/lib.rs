//! WoodMoon Storefront client state.
//!
//! This crate holds the storefront's client-side state: who is signed in and
//! what is in the cart, both persisted to durable storage so they survive
//! restarts. Views (the CLI, or any other front end) read and mutate the
//! state exclusively through the stores exposed here.
//!
//! # Architecture
//!
//! - [`storage`] - durable key-value storage (`FileStorage`, `MemoryStorage`)
//! - [`store`] - generic observable state container with a persisted snapshot
//! - [`stores`] - `AuthStore`, `CartStore` and the per-identity `UserCartResolver`
//! - [`state`] - `AppState`, the application-root context owning one of each store
//! - [`services`] - HTTP login against the REST backend
//! - [`config`] - environment-driven configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod storage;
pub mod store;
pub mod stores;
