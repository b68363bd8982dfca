//! Mastodon Client Library
//!
//! An async Rust client for Mastodon-compatible servers, built around the
//! real-time streaming API.
//!
//! # Features
//!
//! - **Streaming**: user, local, hashtag, list and firehose timelines as typed
//!   events, through a callback or a `futures::Stream`
//! - **Chunk-safe decoding**: events are never lost, duplicated or reordered,
//!   however the network splits the bytes
//! - **Forward compatible**: unknown event types are skipped, not errors
//! - **Cancellation**: a shared signal stops a subscription between reads
//! - **REST primitives**: typed object and collection requests
//! - **Observability**: `tracing` spans, credential redaction, stream counters
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mastodon_streaming::{DomainEvent, MastodonClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MastodonClient::from_env()?;
//!
//!     client
//!         .streaming()
//!         .local(|event| {
//!             if let DomainEvent::Status(status) = event {
//!                 println!("{}: {}", status.id, status.content);
//!             }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Stream Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use mastodon_streaming::{CancellationSignal, MastodonClient, StreamTopic};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MastodonClient::from_env()?;
//!     let cancel = CancellationSignal::new();
//!
//!     let mut events = client
//!         .streaming()
//!         .subscription(StreamTopic::Hashtag("rustlang".to_string()))
//!         .cancel_on(cancel.clone())
//!         .into_stream()?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod rest;
pub mod streaming;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{MastodonClient, MastodonClientBuilder};
pub use config::MastodonConfig;
pub use errors::{MalformedEventError, MastodonError, MastodonResult};
pub use rest::RestClient;
pub use streaming::{
    CancellationSignal, DomainEvent, EventStream, MalformedEventPolicy, QueryParams, StreamTopic,
    StreamingClient, StreamingClientBuilder, Subscription,
};

// Type re-exports
pub use types::{Account, DeletedStatus, Field, Mention, Notification, Status, Tag, Visibility};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
