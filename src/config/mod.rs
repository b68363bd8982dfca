//! Configuration module for the Mastodon client.
//!
//! Holds the instance base URL, the access token, timeouts and extra headers
//! shared by the REST primitives and the streaming core.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::{Host, Url};

use crate::errors::{MastodonError, MastodonResult};

/// Default REST request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("mastodon-streaming/", env!("CARGO_PKG_VERSION"));

/// Configuration for the Mastodon client.
#[derive(Clone)]
pub struct MastodonConfig {
    /// Access token for authentication (stored securely).
    pub(crate) access_token: SecretString,
    /// Base URL of the instance, e.g. `https://mastodon.social`.
    pub base_url: Url,
    /// Total timeout for REST requests.
    pub timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Maximum idle time between two streamed chunks. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl MastodonConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MastodonConfigBuilder {
        MastodonConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MASTODON_BASE_URL` (required): Instance URL
    /// - `MASTODON_ACCESS_TOKEN` (required): Bearer token
    /// - `MASTODON_TIMEOUT` (optional): REST timeout in seconds
    /// - `MASTODON_CONNECT_TIMEOUT` (optional): Connect timeout in seconds
    /// - `MASTODON_READ_TIMEOUT` (optional): Streaming idle timeout in seconds
    pub fn from_env() -> MastodonResult<Self> {
        let base_url = std::env::var("MASTODON_BASE_URL").map_err(|_| {
            MastodonError::configuration("MASTODON_BASE_URL environment variable not set")
        })?;
        let access_token = std::env::var("MASTODON_ACCESS_TOKEN").map_err(|_| {
            MastodonError::configuration("MASTODON_ACCESS_TOKEN environment variable not set")
        })?;

        let mut builder = MastodonConfigBuilder::new()
            .base_url(base_url)
            .access_token(access_token);

        if let Some(secs) = env_secs("MASTODON_TIMEOUT") {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_secs("MASTODON_CONNECT_TIMEOUT") {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_secs("MASTODON_READ_TIMEOUT") {
            builder = builder.read_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Returns the access token (exposing the secret).
    pub(crate) fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Returns a hint of the token (last 4 characters) for debugging.
    pub fn token_hint(&self) -> String {
        token_hint(self.access_token.expose_secret())
    }

    /// Returns true if requests go over TLS.
    pub fn uses_tls(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Returns the full URL for an API path.
    pub fn endpoint_url(&self, path: &str) -> MastodonResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

impl std::fmt::Debug for MastodonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonConfig")
            .field("access_token", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Builder for `MastodonConfig`.
#[derive(Default)]
pub struct MastodonConfigBuilder {
    access_token: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    user_agent: Option<String>,
    custom_headers: Vec<(String, String)>,
}

impl MastodonConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the access token from an environment variable.
    pub fn access_token_from_env(mut self, var_name: &str) -> MastodonResult<Self> {
        let token = std::env::var(var_name).map_err(|_| {
            MastodonError::configuration(format!("Environment variable {var_name} not set"))
        })?;
        self.access_token = Some(token);
        Ok(self)
    }

    /// Sets the instance base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the REST request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the streaming read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MastodonResult<MastodonConfig> {
        let access_token = self
            .access_token
            .ok_or_else(|| MastodonError::configuration("Access token is required"))?;

        if access_token.is_empty() {
            return Err(MastodonError::configuration("Access token cannot be empty"));
        }

        let raw_url = self
            .base_url
            .ok_or_else(|| MastodonError::configuration("Base URL is required"))?;

        // Url::join drops the last segment unless the base ends with a slash.
        let normalized = format!("{}/", raw_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| MastodonError::configuration(format!("Invalid base URL: {e}")))?;

        match base_url.scheme() {
            "https" => {}
            "http" => {
                if !is_loopback(&base_url) {
                    tracing::warn!(
                        base_url = %base_url,
                        "Base URL uses plaintext HTTP; the access token will be sent unencrypted"
                    );
                }
            }
            other => {
                return Err(MastodonError::configuration(format!(
                    "Unsupported URL scheme '{other}', expected http or https"
                )));
            }
        }

        Ok(MastodonConfig {
            access_token: SecretString::new(access_token),
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: self.read_timeout,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            custom_headers: self.custom_headers,
        })
    }
}

pub(crate) fn token_hint(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("...{tail}")
    } else {
        "****".to_string()
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}
