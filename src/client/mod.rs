//! Mastodon API client.
//!
//! Bundles the streaming client and the REST primitives over one shared
//! transport, auth provider and configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthProvider;
use crate::config::MastodonConfig;
use crate::errors::MastodonResult;
use crate::observability::{init_logging, LogConfig, StreamMetrics};
use crate::rest::RestClient;
use crate::streaming::{MalformedEventPolicy, StreamingClient, StreamingClientBuilder};
use crate::transport::HttpTransport;

/// The main Mastodon client.
///
/// # Example
///
/// ```rust,no_run
/// use mastodon_streaming::{DomainEvent, MastodonClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MastodonClient::builder()
///         .base_url("https://mastodon.social")
///         .access_token("your_access_token")
///         .build()?;
///
///     client
///         .streaming()
///         .user(|event| match event {
///             DomainEvent::Status(status) => println!("status {}", status.id),
///             DomainEvent::Notification(n) => println!("{} notification", n.kind),
///             DomainEvent::Delete(deleted) => println!("deleted {deleted}"),
///             DomainEvent::Ignored => {}
///         })
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MastodonClient {
    streaming: StreamingClient,
    rest: RestClient,
}

impl MastodonClient {
    /// Creates a new client builder.
    pub fn builder() -> MastodonClientBuilder {
        MastodonClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`MastodonConfig::from_env`] for the variables read.
    pub fn from_env() -> MastodonResult<Self> {
        let config = MastodonConfig::from_env()?;
        MastodonClientBuilder::from_config(config).build()
    }

    /// Creates a client from a base URL and an access token.
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> MastodonResult<Self> {
        MastodonClientBuilder::new()
            .base_url(base_url)
            .access_token(access_token)
            .build()
    }

    /// Returns the streaming client.
    pub fn streaming(&self) -> &StreamingClient {
        &self.streaming
    }

    /// Returns the REST primitives.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MastodonConfig {
        self.streaming.config()
    }
}

impl std::fmt::Debug for MastodonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonClient")
            .field("config", self.config())
            .finish()
    }
}

/// Builder for the Mastodon client.
pub struct MastodonClientBuilder {
    streaming: StreamingClientBuilder,
    log_config: Option<LogConfig>,
}

impl MastodonClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            streaming: StreamingClientBuilder::new(),
            log_config: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: MastodonConfig) -> Self {
        Self {
            streaming: StreamingClientBuilder::new().config(config),
            log_config: None,
        }
    }

    /// Sets the instance base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.streaming = self.streaming.base_url(base_url);
        self
    }

    /// Sets the access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.streaming = self.streaming.access_token(token);
        self
    }

    /// Sets the REST request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.streaming = self.streaming.timeout(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.streaming = self.streaming.connect_timeout(timeout);
        self
    }

    /// Sets the maximum idle time between two streamed chunks.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.streaming = self.streaming.read_timeout(timeout);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.streaming = self.streaming.user_agent(user_agent);
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.streaming = self.streaming.header(name, value);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.streaming = self.streaming.transport(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.streaming = self.streaming.auth(auth);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn StreamMetrics>) -> Self {
        self.streaming = self.streaming.metrics(metrics);
        self
    }

    /// Sets the hook run right before each streaming request.
    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.streaming = self.streaming.before_request(hook);
        self
    }

    /// Sets how malformed events are handled.
    pub fn malformed_policy(mut self, policy: MalformedEventPolicy) -> Self {
        self.streaming = self.streaming.malformed_policy(policy);
        self
    }

    /// Installs a global `tracing` subscriber with this configuration when
    /// the client is built. Ignored if one is already installed.
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.log_config = Some(config);
        self
    }

    /// Builds the client.
    pub fn build(self) -> MastodonResult<MastodonClient> {
        if let Some(log_config) = &self.log_config {
            init_logging(log_config);
        }

        let streaming = self.streaming.build()?;
        let rest = RestClient::new(
            streaming.transport(),
            streaming.requests().clone(),
            streaming.config().timeout,
        );

        tracing::debug!(
            base_url = %streaming.config().base_url,
            token = %streaming.config().token_hint(),
            "Mastodon client ready"
        );

        Ok(MastodonClient { streaming, rest })
    }
}

impl Default for MastodonClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
