//! Shared tunnel secret
//!
//! The frontend presents the secret as `Authorization: Bearer <secret>`;
//! the relay accepts an upgrade only when that header matches exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared secret between the frontend and the relay
///
/// Immutable once constructed. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Create a credential from a secret string
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `Authorization` header value for this secret
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Check an `Authorization` header value against this secret
    pub fn matches_authorization(&self, value: &[u8]) -> bool {
        let expected = self.bearer();
        let expected = expected.as_bytes();

        expected.len() == value.len()
            && expected
                .iter()
                .zip(value)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}
