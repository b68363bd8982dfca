//! Mock implementations for testing.
//!
//! Provides a mock transport whose streaming bodies are delivered in
//! caller-chosen chunks, and a mock auth provider, for unit testing without
//! a server.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::AuthProvider;
use crate::errors::MastodonResult;
use crate::transport::{
    ByteStream, HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamingResponse,
    TransportError,
};

/// Mock HTTP transport for testing.
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Full request URL.
    pub url: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum MockChunk {
    Data(Bytes),
    Error(String),
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    chunks: Vec<MockChunk>,
    connect_error: Option<String>,
    hang: bool,
    stall: bool,
}

impl MockResponse {
    fn new(status: u16, content_type: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());

        Self {
            status,
            headers,
            chunks: Vec::new(),
            connect_error: None,
            hang: false,
            stall: false,
        }
    }

    /// Creates an event stream delivered as a single chunk.
    pub fn sse(body: &str) -> Self {
        Self::chunked([body.as_bytes().to_vec()])
    }

    /// Creates an event stream delivered in exactly the given chunks.
    pub fn chunked<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let mut response = Self::new(200, "text/event-stream");
        response.chunks = chunks
            .into_iter()
            .map(|c| MockChunk::Data(c.into()))
            .collect();
        response
    }

    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let mut response = Self::new(200, "application/json");
        response.chunks = vec![MockChunk::Data(Bytes::from(
            serde_json::to_vec(value).unwrap_or_default(),
        ))];
        response
    }

    /// Creates an error response in the server's `{"error": ...}` shape.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message });
        Self::json(&body).with_status(status)
    }

    /// Creates a response whose request never reaches the server.
    pub fn connect_error(message: &str) -> Self {
        let mut response = Self::new(0, "text/plain");
        response.connect_error = Some(message.to_string());
        response
    }

    /// Creates a response whose head never arrives.
    pub fn stalled() -> Self {
        let mut response = Self::new(200, "text/event-stream");
        response.stall = true;
        response
    }

    /// Creates a response with custom status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Fails the body read after the chunks delivered so far.
    pub fn then_error(mut self, message: &str) -> Self {
        self.chunks.push(MockChunk::Error(message.to_string()));
        self
    }

    /// Keeps the body open without sending anything after the last chunk.
    pub fn then_pending(mut self) -> Self {
        self.hang = true;
        self
    }

    fn body(&self) -> Vec<u8> {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                MockChunk::Data(bytes) => Some(bytes.as_ref()),
                MockChunk::Error(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    fn into_stream(self) -> ByteStream {
        let items = stream::iter(self.chunks.into_iter().map(|chunk| match chunk {
            MockChunk::Data(bytes) => Ok(bytes),
            MockChunk::Error(message) => Err(TransportError::Read { message }),
        }));

        if self.hang {
            Box::pin(futures::StreamExt::chain(items, stream::pending()))
        } else {
            Box::pin(items)
        }
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock transport with one queued response.
    pub fn with_response(response: MockResponse) -> Self {
        let transport = Self::new();
        transport.queue(response);
        transport
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_response(&self, request: &HttpRequest) -> Result<MockResponse, TransportError> {
        lock(&self.requests).push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            body: request.body.clone(),
            headers: request.headers.clone(),
        });

        let response = lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::error(500, "No mock response configured"));

        match response.connect_error {
            Some(message) => Err(TransportError::Connection { message }),
            None => Ok(response),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self.next_response(&request)?;

        if let Some(MockChunk::Error(message)) = response
            .chunks
            .iter()
            .find(|c| matches!(c, MockChunk::Error(_)))
        {
            return Err(TransportError::Read {
                message: message.clone(),
            });
        }

        Ok(HttpResponse {
            status: response.status,
            body: response.body(),
            headers: response.headers,
        })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let response = self.next_response(&request)?;
        if response.stall {
            futures::future::pending::<()>().await;
        }

        Ok(StreamingResponse {
            status: response.status,
            headers: response.headers.clone(),
            stream: response.into_stream(),
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Mock auth provider for testing.
pub struct MockAuth {
    token: String,
}

impl MockAuth {
    /// Creates a new mock auth provider.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new("mock_access_token")
    }
}

impl AuthProvider for MockAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> MastodonResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MockAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuth").finish()
    }
}

/// Wire fixtures for the streaming API.
pub mod fixtures {
    /// An `update` frame carrying a minimal status.
    pub fn update_frame(id: &str) -> String {
        format!("event: update\ndata: {{\"id\":\"{id}\",\"content\":\"<p>status {id}</p>\"}}\n\n")
    }

    /// A `notification` frame of the given type.
    pub fn notification_frame(id: &str, kind: &str) -> String {
        format!(
            "event: notification\ndata: {{\"id\":\"{id}\",\"type\":\"{kind}\",\"account\":{{\"id\":\"1\"}}}}\n\n"
        )
    }

    /// A `delete` frame.
    pub fn delete_frame(id: &str) -> String {
        format!("event: delete\ndata: {id}\n\n")
    }

    /// The heartbeat comment servers send on idle streams.
    pub const HEARTBEAT: &str = ":thump\n\n";
}
