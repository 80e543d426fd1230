//! Email address type.
//!
//! The signed-in principal of the storefront is identified by its email, so
//! this type doubles as the user identity held by the auth store and is
//! embedded verbatim in per-identity cart keys (`cart_<email>`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a login-form email was rejected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,
    #[error("email is {len} characters long, the limit is {}", Email::MAX_LENGTH)]
    TooLong { len: usize },
    /// Missing `@`, or nothing on one side of it.
    #[error("email must look like name@domain")]
    Malformed,
}

/// An email address identifying a storefront user.
///
/// Only the shape is checked (`local@domain`, at most 254 bytes); the backend
/// decides whether the account exists. Values read back from durable storage
/// are trusted and not re-validated.
///
/// ```
/// use woodmoon_core::Email;
///
/// let email = Email::parse(" buyer@woodmoon.lk ").unwrap();
/// assert_eq!(email.as_str(), "buyer@woodmoon.lk");
/// assert!(Email::parse("buyer@").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Validate a user-entered address. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] describing the first problem found.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let input = input.trim();
        match input.len() {
            0 => return Err(EmailError::Empty),
            len if len > Self::MAX_LENGTH => return Err(EmailError::TooLong { len }),
            _ => {}
        }

        match input.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(input.to_owned()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first `@`, used as a greeting name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(&self.0, |(local, _)| local)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
