//! Session token type.
//!
//! The backend answers a successful login with an opaque bearer token. This
//! layer stores and forwards it without interpreting its structure.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque bearer credential issued by the backend at login.
///
/// Serializes as a plain string so persisted snapshots keep the
/// `{"user": ..., "token": ...}` layout. `Debug` is redacted so tokens never
/// end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token, e.g. to build an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}
