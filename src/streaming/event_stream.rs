//! Pull-based delivery of streaming events.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::Instrument;
use uuid::Uuid;

use super::cancel::CancellationSignal;
use super::client::{dispatch, BeforeRequestHook, MalformedEventPolicy};
use super::connection::Connection;
use super::parser::DomainEvent;
use crate::errors::{MastodonError, MastodonResult};
use crate::observability::StreamMetrics;
use crate::transport::HttpRequest;

/// Everything a subscription stream needs besides its connection.
pub(super) struct StreamSetup {
    pub request: HttpRequest,
    pub metrics: Arc<dyn StreamMetrics>,
    pub before_request: Option<BeforeRequestHook>,
    pub cancel: Option<CancellationSignal>,
    pub policy: MalformedEventPolicy,
}

pin_project! {
    /// A subscription as a [`Stream`] of events.
    ///
    /// Nothing is requested until the first poll. Unmapped event types are
    /// skipped; malformed events are skipped or yielded as errors according
    /// to [`MalformedEventPolicy`]. A terminal error is yielded once, after
    /// which the stream ends. Dropping the stream closes the connection.
    pub struct EventStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = MastodonResult<DomainEvent>> + Send>>,
        subscription_id: Uuid,
        delivered: u64,
        done: bool,
    }
}

impl EventStream {
    pub(super) fn new(mut connection: Connection, setup: StreamSetup) -> Self {
        let subscription_id = connection.id();
        let span = tracing::info_span!(
            "subscription",
            subscription_id = %subscription_id,
            path = %setup.request.url.path(),
        );

        let StreamSetup {
            request,
            metrics,
            before_request,
            cancel,
            policy,
        } = setup;

        let inner = async_stream::stream! {
            if let Some(hook) = &before_request {
                hook();
            }

            let opened = connection
                .open(request, cancel.as_ref())
                .instrument(span.clone())
                .await;
            if let Err(e) = opened {
                yield Err(e);
                return;
            }

            loop {
                let next = connection
                    .next_frame(cancel.as_ref())
                    .instrument(span.clone())
                    .await;

                let frame = match next {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                match dispatch(&frame, metrics.as_ref()) {
                    Some(Ok(event)) => {
                        metrics.record_event_delivered();
                        yield Ok(event);
                    }
                    Some(Err(e)) if policy == MalformedEventPolicy::Surface => {
                        yield Err(MastodonError::from(e));
                    }
                    _ => {}
                }
            }
        };

        Self {
            inner: Box::pin(inner),
            subscription_id,
            delivered: 0,
            done: false,
        }
    }

    /// ID attached to this subscription's log lines.
    pub fn subscription_id(&self) -> Uuid {
        self.subscription_id
    }

    /// Number of events yielded so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Stream for EventStream {
    type Item = MastodonResult<DomainEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                *this.delivered += 1;
                Poll::Ready(Some(Ok(event)))
            }
            Poll::Ready(Some(Err(e))) => {
                if e.is_terminal() {
                    *this.done = true;
                }
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl futures::stream::FusedStream for EventStream {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("subscription_id", &self.subscription_id)
            .field("delivered", &self.delivered)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
