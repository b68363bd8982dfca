//! Real-time streaming API.
//!
//! A subscription opens one long-lived HTTP connection to a path under
//! `/api/v1/streaming/` and reads its Server-Sent Events body:
//!
//! - [`RequestBuilder`] builds the authenticated request;
//! - [`Connection`] owns the body and drives the read loop;
//! - [`FrameDecoder`] splits the bytes into frames, whatever the chunking;
//! - [`classify`] maps each frame to a [`DomainEvent`];
//! - [`StreamingClient`] ties them together and delivers events through a
//!   callback or an [`EventStream`].

mod cancel;
mod client;
mod connection;
mod decoder;
mod event_stream;
mod parser;
mod request;
mod topic;

pub use cancel::CancellationSignal;
pub use client::{
    BeforeRequestHook, MalformedEventPolicy, StreamingClient, StreamingClientBuilder, Subscription,
};
pub use connection::{Connection, ConnectionState, MAX_ERROR_BODY};
pub use decoder::{Frame, FrameDecoder, DEFAULT_EVENT_TYPE};
pub use event_stream::EventStream;
pub use parser::{classify, DomainEvent, EVENT_DELETE, EVENT_NOTIFICATION, EVENT_UPDATE};
pub use request::{QueryParams, QueryValue, RequestBuilder, STREAMING_PREFIX};
pub use topic::StreamTopic;
