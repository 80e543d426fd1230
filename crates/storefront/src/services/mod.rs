//! Clients for the REST backend.
//!
//! # Services
//!
//! - `auth` - Email/password login returning a session token
//!
//! Product, category, service-request and contact endpoints are consumed by
//! the views directly and are not wrapped here.

pub mod auth;

pub use auth::{AuthClient, LoginError};
