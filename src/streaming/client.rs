//! Streaming client facade.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

use super::cancel::CancellationSignal;
use super::connection::Connection;
use super::decoder::Frame;
use super::event_stream::{EventStream, StreamSetup};
use super::parser::{classify, DomainEvent};
use super::request::{QueryParams, QueryValue, RequestBuilder};
use super::topic::StreamTopic;
use crate::auth::{AuthProvider, BearerTokenAuth};
use crate::config::{MastodonConfig, MastodonConfigBuilder};
use crate::errors::{MalformedEventError, MastodonError, MastodonResult};
use crate::observability::{DefaultStreamMetrics, StreamMetrics, StreamMetricsSnapshot};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};

/// Hook run right before a streaming request is issued.
pub type BeforeRequestHook = Arc<dyn Fn() + Send + Sync>;

/// What happens to a recognized event whose payload fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedEventPolicy {
    /// Log, count and drop the event.
    #[default]
    Skip,
    /// Yield the error from [`EventStream`], then keep streaming.
    ///
    /// Callback delivery always skips.
    Surface,
}

/// Client for the streaming API.
///
/// Every call opens its own connection and runs its read loop on the
/// calling task. Callbacks run in wire order, and each returns before the
/// next read is issued.
///
/// # Example
///
/// ```rust,no_run
/// use mastodon_streaming::{DomainEvent, StreamingClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = StreamingClient::builder()
///         .base_url("https://mastodon.social")
///         .access_token("your_access_token")
///         .build()?;
///
///     client
///         .hashtag("rustlang", |event| {
///             if let DomainEvent::Status(status) = event {
///                 println!("{}", status.content);
///             }
///         })
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct StreamingClient {
    config: MastodonConfig,
    transport: Arc<dyn HttpTransport>,
    requests: RequestBuilder,
    metrics: Arc<dyn StreamMetrics>,
    before_request: Option<BeforeRequestHook>,
    malformed_policy: MalformedEventPolicy,
}

impl StreamingClient {
    /// Creates a new client builder.
    pub fn builder() -> StreamingClientBuilder {
        StreamingClientBuilder::new()
    }

    /// Streams the home timeline and notifications of the authenticated user.
    pub async fn user<F>(&self, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::User).run(callback).await
    }

    /// Streams public statuses from the local instance.
    pub async fn local<F>(&self, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::LocalTimeline)
            .run(callback)
            .await
    }

    /// Streams public statuses carrying a hashtag.
    pub async fn hashtag<F>(&self, tag: impl Into<String>, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::Hashtag(tag.into()))
            .run(callback)
            .await
    }

    /// Streams local public statuses carrying a hashtag.
    pub async fn local_hashtag<F>(&self, tag: impl Into<String>, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::LocalHashtag(tag.into()))
            .run(callback)
            .await
    }

    /// Streams statuses from a list.
    pub async fn list<F>(&self, id: impl Into<String>, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::List(id.into()))
            .run(callback)
            .await
    }

    /// Streams all public statuses known to the instance.
    pub async fn firehose<F>(&self, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        self.subscription(StreamTopic::Firehose).run(callback).await
    }

    /// Streams an arbitrary path under `/api/v1/streaming/`.
    pub async fn stream<F>(&self, path: &str, params: QueryParams, callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        Subscription::new(self, path.to_string(), params)
            .run(callback)
            .await
    }

    /// Starts configuring a subscription to a topic.
    pub fn subscription(&self, topic: StreamTopic) -> Subscription<'_> {
        Subscription::new(self, topic.path().to_string(), topic.query())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MastodonConfig {
        &self.config
    }

    /// Returns a snapshot of the stream counters.
    pub fn metrics(&self) -> StreamMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    pub(crate) fn requests(&self) -> &RequestBuilder {
        &self.requests
    }

    fn connection(&self) -> Connection {
        Connection::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.metrics),
            self.config.read_timeout,
        )
    }

    fn invoke_hook(&self) {
        if let Some(hook) = &self.before_request {
            hook();
        }
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("config", &self.config)
            .field("has_before_request", &self.before_request.is_some())
            .field("malformed_policy", &self.malformed_policy)
            .finish_non_exhaustive()
    }
}

/// A subscription being configured.
///
/// Created by [`StreamingClient::subscription`]; consumed by [`run`] for
/// callback delivery or [`into_stream`] for a [`futures::Stream`].
///
/// [`run`]: Subscription::run
/// [`into_stream`]: Subscription::into_stream
#[must_use = "a subscription does nothing until run or polled"]
pub struct Subscription<'a> {
    client: &'a StreamingClient,
    path: String,
    params: QueryParams,
    cancel: Option<CancellationSignal>,
}

impl<'a> Subscription<'a> {
    fn new(client: &'a StreamingClient, path: String, params: QueryParams) -> Self {
        Self {
            client,
            path,
            params,
            cancel: None,
        }
    }

    /// Adds a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Adds a query parameter sent once per value (`key=a&key=b`).
    pub fn param_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.insert_list(key, values);
        self
    }

    /// Stops the subscription when `signal` fires.
    pub fn cancel_on(mut self, signal: CancellationSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Runs the subscription, handing each event to `callback`.
    ///
    /// Returns `Ok(())` when the stream ends or is cancelled, and the error
    /// when the connection fails.
    pub async fn run<F>(self, mut callback: F) -> MastodonResult<()>
    where
        F: FnMut(DomainEvent),
    {
        let request = self.build_request()?;
        let client = self.client;
        let mut connection = client.connection();
        let span = info_span!(
            "subscription",
            subscription_id = %connection.id(),
            path = %self.path,
        );
        let metrics = Arc::clone(&client.metrics);
        let cancel = self.cancel;

        async move {
            client.invoke_hook();
            connection
                .run(request, cancel.as_ref(), |frame| {
                    // Push delivery always skips malformed events.
                    if let Some(Ok(event)) = dispatch(&frame, metrics.as_ref()) {
                        metrics.record_event_delivered();
                        callback(event);
                    }
                })
                .await
        }
        .instrument(span)
        .await
    }

    /// Turns the subscription into a [`Stream`](futures::Stream) of events.
    ///
    /// The request is validated now and sent on the first poll.
    pub fn into_stream(self) -> MastodonResult<EventStream> {
        let request = self.build_request()?;
        let client = self.client;

        Ok(EventStream::new(
            client.connection(),
            StreamSetup {
                request,
                metrics: Arc::clone(&client.metrics),
                before_request: client.before_request.clone(),
                cancel: self.cancel,
                policy: client.malformed_policy,
            },
        ))
    }

    fn build_request(&self) -> MastodonResult<HttpRequest> {
        self.client
            .requests
            .streaming_request(&self.path, &self.params)
    }
}

impl std::fmt::Debug for Subscription<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("params", &self.params)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Classifies a frame and records the outcome.
///
/// Returns `None` for unmapped event types.
pub(super) fn dispatch(
    frame: &Frame,
    metrics: &dyn StreamMetrics,
) -> Option<Result<DomainEvent, MalformedEventError>> {
    match classify(&frame.event_type, &frame.payload) {
        Ok(DomainEvent::Ignored) => {
            metrics.record_event_ignored();
            debug!(event_type = %frame.event_type, "Ignoring unmapped event");
            None
        }
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            metrics.record_malformed_event();
            warn!(
                event_type = %e.event_type,
                reason = %e.reason,
                bytes = frame.payload.len(),
                "Malformed event"
            );
            Some(Err(e))
        }
    }
}

/// Builder for the streaming client.
pub struct StreamingClientBuilder {
    config_builder: MastodonConfigBuilder,
    config: Option<MastodonConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    metrics: Option<Arc<dyn StreamMetrics>>,
    before_request: Option<BeforeRequestHook>,
    malformed_policy: MalformedEventPolicy,
}

impl StreamingClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: MastodonConfigBuilder::new(),
            config: None,
            transport: None,
            auth: None,
            metrics: None,
            before_request: None,
            malformed_policy: MalformedEventPolicy::default(),
        }
    }

    /// Uses a complete configuration, replacing any individual settings.
    pub fn config(mut self, config: MastodonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the instance base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.access_token(token);
        self
    }

    /// Sets the REST request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Sets the maximum idle time between two streamed chunks.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.read_timeout(timeout);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(user_agent);
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.header(name, value);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the hook run right before each streaming request.
    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    /// Sets how malformed events are handled.
    pub fn malformed_policy(mut self, policy: MalformedEventPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    /// Builds the client.
    pub fn build(self) -> MastodonResult<StreamingClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(auth) => auth,
            None => Arc::new(BearerTokenAuth::new(config.access_token.clone())),
        };
        auth.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(config.connect_timeout, &config.user_agent).map_err(
                    |e| MastodonError::configuration(format!("Failed to create transport: {e}")),
                )?,
            ),
        };

        let metrics: Arc<dyn StreamMetrics> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultStreamMetrics::new()));

        Ok(StreamingClient {
            requests: RequestBuilder::new(&config, auth),
            config,
            transport,
            metrics,
            before_request: self.before_request,
            malformed_policy: self.malformed_policy,
        })
    }
}

impl Default for StreamingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
