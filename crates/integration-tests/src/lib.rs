//! Integration tests for the WoodMoon storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p woodmoon-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_properties` - Property tests for cart merge and removal
//! - `persistence` - Restart behaviour over file-backed storage
//! - `user_cart` - Identity cart keys and legacy cart migration
//! - `login` - Sign-in against a mock backend
//!
//! Everything runs in-process: storage goes to temporary directories and the
//! backend is a `wiremock` server, so no external services are needed.
