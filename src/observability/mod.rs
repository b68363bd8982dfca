//! Observability module for the Mastodon client.
//!
//! Structured logging through `tracing`, redaction of credentials in logged
//! text, and counters for streaming subscriptions.

mod logging;
mod metrics;

pub use logging::{init_logging, redact, LogConfig, LogFormat, LogLevel};
pub use metrics::{DefaultStreamMetrics, NoopStreamMetrics, StreamMetrics, StreamMetricsSnapshot};
