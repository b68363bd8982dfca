//! Authentication module for the Mastodon client.
//!
//! Bearer token authentication shared by the REST primitives and the
//! streaming core.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::config::token_hint;
use crate::errors::MastodonError;

/// Authentication provider trait.
///
/// Implementations of this trait provide authentication credentials
/// for API requests.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> Result<(), MastodonError>;
}

/// Bearer token authentication provider.
pub struct BearerTokenAuth {
    token: SecretString,
}

impl BearerTokenAuth {
    /// Creates a new bearer token provider.
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }

    /// Creates from a string token.
    pub fn from_string(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    /// Gets a hint of the token for debugging (last 4 characters).
    pub fn token_hint(&self) -> String {
        token_hint(self.token.expose_secret())
    }
}

impl AuthProvider for BearerTokenAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.token.expose_secret()),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), MastodonError> {
        let token = self.token.expose_secret();

        if token.is_empty() {
            return Err(MastodonError::configuration("Access token cannot be empty"));
        }

        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(MastodonError::invalid_param(
                "Access token contains whitespace or control characters",
                "Authorization",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for BearerTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenAuth")
            .field("token", &"[REDACTED]")
            .field("token_hint", &self.token_hint())
            .finish()
    }
}
