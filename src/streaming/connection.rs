//! One streaming connection and its read loop.

use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::cancel::CancellationSignal;
use super::decoder::{Frame, FrameDecoder};
use crate::errors::{MastodonError, MastodonResult};
use crate::observability::StreamMetrics;
use crate::transport::{ByteStream, HttpRequest, HttpTransport, StreamingResponse};

/// Upper bound on how much of an error response body is read.
pub const MAX_ERROR_BODY: usize = 64 * 1024;

/// Lifecycle of a [`Connection`].
///
/// Transitions only move forward; `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no request issued yet.
    Idle,
    /// Request sent, waiting for the response head.
    Connecting,
    /// 2xx received, body is being read.
    Streaming,
    /// Body ended or the subscription was cancelled.
    Closed,
    /// The request or a read failed.
    Failed,
}

impl ConnectionState {
    /// Returns true for `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Streaming)
                | (Connecting, Closed)
                | (Connecting, Failed)
                | (Streaming, Closed)
                | (Streaming, Failed)
        )
    }
}

/// A single streaming HTTP connection.
///
/// Owns the response body and the frame decoder. Frames come out in exactly
/// the order their bytes arrived; nothing is retried at this layer.
pub struct Connection {
    id: Uuid,
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<dyn StreamMetrics>,
    read_timeout: Option<Duration>,
    state: ConnectionState,
    decoder: FrameDecoder,
    body: Option<ByteStream>,
    pending: VecDeque<Frame>,
}

impl Connection {
    /// Creates an idle connection.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        metrics: Arc<dyn StreamMetrics>,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            metrics,
            read_timeout,
            state: ConnectionState::Idle,
            decoder: FrameDecoder::new(),
            body: None,
            pending: VecDeque::new(),
        }
    }

    /// Unique ID used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Issues the request and waits for the response head.
    ///
    /// The wait is bounded by the read timeout and ends early if `cancel`
    /// fires, which closes the connection without an error. On a non-2xx
    /// status a bounded part of the body is read to recover the server's
    /// error message, and the connection fails.
    pub async fn open(
        &mut self,
        request: HttpRequest,
        cancel: Option<&CancellationSignal>,
    ) -> MastodonResult<()> {
        if self.state != ConnectionState::Idle {
            return Err(MastodonError::invalid_request(format!(
                "Connection already used (state {:?})",
                self.state
            )));
        }

        self.transition(ConnectionState::Connecting);
        debug!(connection_id = %self.id, path = %request.url.path(), "Opening stream");

        let send = send_request(self.transport.as_ref(), request, self.read_timeout);
        let outcome = match cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                sent = send => Some(sent),
            },
            None => Some(send.await),
        };

        let response = match outcome {
            None => {
                self.close("cancelled before response");
                return Ok(());
            }
            Some(Ok(response)) => response,
            Some(Err(e)) => return Err(self.fail(e)),
        };

        if !response.is_success() {
            let error = error_from_response(response, self.read_timeout).await;
            return Err(self.fail(error));
        }

        self.body = Some(response.stream);
        self.transition(ConnectionState::Streaming);
        self.metrics.record_connection_opened();
        info!(connection_id = %self.id, "Stream connected");
        Ok(())
    }

    /// Returns the next frame, reading from the body as needed.
    ///
    /// Returns `Ok(None)` once the connection is closed, either because the
    /// body ended or because `cancel` fired. Cancellation is only observed
    /// between reads: frames from a chunk already read are returned first.
    pub async fn next_frame(
        &mut self,
        cancel: Option<&CancellationSignal>,
    ) -> MastodonResult<Option<Frame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            match self.state {
                ConnectionState::Streaming => {}
                state if state.is_terminal() => return Ok(None),
                state => {
                    return Err(MastodonError::invalid_request(format!(
                        "Connection is not open (state {state:?})"
                    )))
                }
            }

            let read_timeout = self.read_timeout;
            let Some(body) = self.body.as_mut() else {
                self.close("body released");
                return Ok(None);
            };

            let outcome = match cancel {
                Some(cancel) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    read = read_chunk(body, read_timeout) => Some(read),
                },
                None => Some(read_chunk(body, read_timeout).await),
            };

            match outcome {
                None => {
                    self.close("cancelled");
                    return Ok(None);
                }
                Some(Ok(Some(chunk))) => self.ingest(&chunk),
                Some(Ok(None)) => {
                    self.close("end of stream");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(self.fail(e)),
            }
        }
    }

    /// Opens the connection and hands every frame to `sink` until the
    /// connection closes or fails.
    ///
    /// The sink returns before the next read is issued.
    pub async fn run<F>(
        &mut self,
        request: HttpRequest,
        cancel: Option<&CancellationSignal>,
        mut sink: F,
    ) -> MastodonResult<()>
    where
        F: FnMut(Frame),
    {
        self.open(request, cancel).await?;
        while let Some(frame) = self.next_frame(cancel).await? {
            sink(frame);
        }
        Ok(())
    }

    fn ingest(&mut self, chunk: &Bytes) {
        trace!(connection_id = %self.id, bytes = chunk.len(), "Chunk received");
        self.metrics.record_bytes(chunk.len());

        for frame in self.decoder.append(chunk) {
            self.metrics.record_frame();
            self.pending.push_back(frame);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(connection_id = %self.id, from = ?self.state, to = ?next, "State change");
        self.state = next;
    }

    fn close(&mut self, reason: &str) {
        self.body = None;
        self.transition(ConnectionState::Closed);

        let decoder = std::mem::take(&mut self.decoder);
        let frames = decoder.frames_decoded();
        let discarded = decoder.finish();
        info!(
            connection_id = %self.id,
            reason,
            frames,
            discarded_bytes = discarded,
            "Stream closed"
        );
    }

    fn fail(&mut self, error: MastodonError) -> MastodonError {
        self.body = None;
        self.pending.clear();
        self.transition(ConnectionState::Failed);
        self.metrics.record_connection_failed();
        warn!(connection_id = %self.id, error = %error, "Stream failed");
        error
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("read_timeout", &self.read_timeout)
            .field("pending_frames", &self.pending.len())
            .finish_non_exhaustive()
    }
}

async fn send_request(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    read_timeout: Option<Duration>,
) -> MastodonResult<StreamingResponse> {
    let send = transport.send_streaming(request);
    let response = match read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| MastodonError::Timeout { timeout })?,
        None => send.await,
    };

    response.map_err(MastodonError::from)
}

async fn read_chunk(
    body: &mut ByteStream,
    read_timeout: Option<Duration>,
) -> MastodonResult<Option<Bytes>> {
    let next = match read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, body.next())
            .await
            .map_err(|_| MastodonError::Timeout { timeout })?,
        None => body.next().await,
    };

    next.transpose().map_err(MastodonError::from)
}

async fn error_from_response(
    response: StreamingResponse,
    read_timeout: Option<Duration>,
) -> MastodonError {
    let request_id = response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("x-request-id"))
        .map(|(_, v)| v.clone());

    let read = read_bounded(response.stream, MAX_ERROR_BODY);
    let body = match read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read).await.unwrap_or_default(),
        None => read.await,
    };

    MastodonError::from_response(response.status, request_id, &body)
}

async fn read_bounded(mut stream: ByteStream, limit: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while body.len() < limit {
        match stream.next().await {
            Some(Ok(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use crate::observability::DefaultStreamMetrics;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn request() -> HttpRequest {
        HttpRequest::get(Url::parse("https://example.com/api/v1/streaming/user").unwrap())
    }

    fn connection(response: MockResponse) -> (Connection, Arc<DefaultStreamMetrics>) {
        let metrics = Arc::new(DefaultStreamMetrics::new());
        let transport = Arc::new(MockTransport::with_response(response));
        (Connection::new(transport, metrics.clone(), None), metrics)
    }

    async fn collect(connection: &mut Connection) -> MastodonResult<Vec<Frame>> {
        let mut frames = Vec::new();
        connection
            .run(request(), None, |frame| frames.push(frame))
            .await?;
        Ok(frames)
    }

    #[test]
    fn test_state_transitions() {
        use ConnectionState::*;

        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Failed));
        assert!(Connecting.can_transition_to(Closed));
        assert!(Streaming.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Streaming));
        assert!(!Streaming.can_transition_to(Connecting));
        assert!(!Idle.can_transition_to(Streaming));
        assert!(Closed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Streaming.is_terminal());
    }

    #[tokio::test]
    async fn test_frames_in_order_then_closed() {
        let body = format!(
            "{}{}{}",
            fixtures::update_frame("1"),
            fixtures::HEARTBEAT,
            fixtures::delete_frame("2")
        );
        let (mut connection, metrics) = connection(MockResponse::sse(&body));

        let frames = collect(&mut connection).await.unwrap();

        let types: Vec<&str> = frames.iter().map(|f| f.event_type.as_str()).collect();
        assert_eq!(types, vec!["update", "delete"]);
        assert_eq!(connection.state(), ConnectionState::Closed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_opened, 1);
        assert_eq!(snapshot.frames_decoded, 2);
        assert_eq!(snapshot.bytes_received, body.len() as u64);
    }

    #[tokio::test]
    async fn test_frame_split_across_chunks() {
        let (mut connection, _) = connection(MockResponse::chunked([
            "event: delete\nda",
            "ta: 4",
            "2\n",
            "\n",
        ]));

        let frames = collect(&mut connection).await.unwrap();

        assert_eq!(frames, vec![Frame::new("delete", "42")]);
    }

    #[tokio::test]
    async fn test_partial_tail_is_discarded_at_close() {
        let (mut connection, _) = connection(MockResponse::sse("event: delete\ndata: 1\n\nevent: upd"));

        let frames = collect(&mut connection).await.unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_unauthorized_before_any_frame() {
        let (mut connection, metrics) =
            connection(MockResponse::error(401, "The access token is invalid"));

        let err = collect(&mut connection).await.unwrap_err();

        match err {
            MastodonError::Unauthorized { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "The access token is invalid");
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert_eq!(metrics.snapshot().connections_failed, 1);
        assert_eq!(metrics.snapshot().connections_opened, 0);
    }

    #[tokio::test]
    async fn test_http_error_keeps_request_id() {
        let (mut connection, _) = connection(
            MockResponse::error(503, "Service unavailable").with_header("X-Request-Id", "req-9"),
        );

        let err = collect(&mut connection).await.unwrap_err();

        assert!(err.is_retryable());
        match err {
            MastodonError::Http {
                status, request_id, ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(request_id.as_deref(), Some("req-9"));
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_error() {
        let (mut connection, _) = connection(MockResponse::connect_error("connection refused"));

        let err = collect(&mut connection).await.unwrap_err();

        assert!(matches!(err, MastodonError::Connection { .. }));
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_read_error_after_frames() {
        let (mut connection, _) = connection(
            MockResponse::sse(&fixtures::delete_frame("1")).then_error("connection reset"),
        );

        let mut frames = Vec::new();
        let err = connection
            .run(request(), None, |frame| frames.push(frame))
            .await
            .unwrap_err();

        assert_eq!(frames.len(), 1);
        assert!(matches!(err, MastodonError::Connection { .. }));
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let metrics = Arc::new(DefaultStreamMetrics::new());
        let transport = Arc::new(MockTransport::with_response(
            MockResponse::sse(&fixtures::delete_frame("1")).then_pending(),
        ));
        let mut connection = Connection::new(transport, metrics, Some(Duration::from_millis(50)));

        let mut frames = Vec::new();
        let err = connection
            .run(request(), None, |frame| frames.push(frame))
            .await
            .unwrap_err();

        assert_eq!(frames.len(), 1);
        assert!(matches!(
            err,
            MastodonError::Timeout { timeout } if timeout == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn test_cancel_closes_cleanly() {
        let (mut connection, _) =
            connection(MockResponse::sse(&fixtures::delete_frame("1")).then_pending());
        let cancel = CancellationSignal::new();

        let mut frames = Vec::new();
        let result = connection
            .run(request(), Some(&cancel), |frame| {
                frames.push(frame);
                cancel.cancel();
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(frames.len(), 1);
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_cancel_still_delivers_frames_already_read() {
        let body = format!(
            "{}{}{}",
            fixtures::delete_frame("1"),
            fixtures::delete_frame("2"),
            fixtures::delete_frame("3")
        );
        let (mut connection, _) = connection(MockResponse::sse(&body).then_pending());
        let cancel = CancellationSignal::new();

        let mut frames = Vec::new();
        connection
            .run(request(), Some(&cancel), |frame| {
                frames.push(frame);
                cancel.cancel();
            })
            .await
            .unwrap();

        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_connection_cannot_be_reopened() {
        let (mut connection, _) = connection(MockResponse::sse(""));
        collect(&mut connection).await.unwrap();

        let err = connection.open(request(), None).await.unwrap_err();
        assert!(matches!(err, MastodonError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_read_timeout_while_waiting_for_head() {
        let metrics = Arc::new(DefaultStreamMetrics::new());
        let transport = Arc::new(MockTransport::with_response(MockResponse::stalled()));
        let mut connection =
            Connection::new(transport, metrics.clone(), Some(Duration::from_millis(50)));

        let err = tokio::time::timeout(Duration::from_secs(2), collect(&mut connection))
            .await
            .expect("open was not bounded by the read timeout")
            .unwrap_err();

        assert!(matches!(
            err,
            MastodonError::Timeout { timeout } if timeout == Duration::from_millis(50)
        ));
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert_eq!(metrics.snapshot().connections_failed, 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_head() {
        let (mut connection, metrics) = connection(MockResponse::stalled());
        let cancel = CancellationSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut frames = Vec::new();
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            connection.run(request(), Some(&cancel), |frame| frames.push(frame)),
        )
        .await
        .expect("cancel did not unblock open");

        assert!(result.is_ok());
        assert!(frames.is_empty());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(metrics.snapshot().connections_opened, 0);
    }
}
