//! Metrics collection for streaming subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector interface.
///
/// Called from the read loop, so implementations must be cheap and must not
/// block.
pub trait StreamMetrics: Send + Sync {
    /// Records a connection that reached the streaming state.
    fn record_connection_opened(&self);

    /// Records a connection that ended in failure.
    fn record_connection_failed(&self);

    /// Records bytes read from the socket.
    fn record_bytes(&self, count: usize);

    /// Records a frame produced by the decoder.
    fn record_frame(&self);

    /// Records an event handed to the caller.
    fn record_event_delivered(&self);

    /// Records a frame of an unrecognized type.
    fn record_event_ignored(&self);

    /// Records a frame whose payload failed to decode.
    fn record_malformed_event(&self);

    /// Gets current metrics.
    fn snapshot(&self) -> StreamMetricsSnapshot;

    /// Resets all metrics.
    fn reset(&self);
}

/// Stream metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamMetricsSnapshot {
    /// Connections that reached the streaming state.
    pub connections_opened: u64,
    /// Connections that failed.
    pub connections_failed: u64,
    /// Total bytes received.
    pub bytes_received: u64,
    /// Frames produced by the decoder.
    pub frames_decoded: u64,
    /// Events delivered to callers.
    pub events_delivered: u64,
    /// Frames of unrecognized types.
    pub events_ignored: u64,
    /// Frames that failed to decode.
    pub malformed_events: u64,
}

impl StreamMetricsSnapshot {
    /// Fraction of decoded frames that reached the caller, as a percentage.
    pub fn delivery_rate(&self) -> f64 {
        if self.frames_decoded == 0 {
            100.0
        } else {
            (self.events_delivered as f64 / self.frames_decoded as f64) * 100.0
        }
    }
}

/// Default metrics collector implementation.
#[derive(Debug, Default)]
pub struct DefaultStreamMetrics {
    connections_opened: AtomicU64,
    connections_failed: AtomicU64,
    bytes_received: AtomicU64,
    frames_decoded: AtomicU64,
    events_delivered: AtomicU64,
    events_ignored: AtomicU64,
    malformed_events: AtomicU64,
}

impl DefaultStreamMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamMetrics for DefaultStreamMetrics {
    fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn record_connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bytes(&self, count: usize) {
        self.bytes_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_frame(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    fn record_malformed_event(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.connections_opened,
            &self.connections_failed,
            &self.bytes_received,
            &self.frames_decoded,
            &self.events_delivered,
            &self.events_ignored,
            &self.malformed_events,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Metrics collector that records nothing.
#[derive(Debug, Default)]
pub struct NoopStreamMetrics;

impl StreamMetrics for NoopStreamMetrics {
    fn record_connection_opened(&self) {}
    fn record_connection_failed(&self) {}
    fn record_bytes(&self, _count: usize) {}
    fn record_frame(&self) {}
    fn record_event_delivered(&self) {}
    fn record_event_ignored(&self) {}
    fn record_malformed_event(&self) {}

    fn snapshot(&self) -> StreamMetricsSnapshot {
        StreamMetricsSnapshot::default()
    }

    fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metrics_counts() {
        let metrics = DefaultStreamMetrics::new();
        metrics.record_connection_opened();
        metrics.record_bytes(128);
        metrics.record_bytes(64);
        metrics.record_frame();
        metrics.record_frame();
        metrics.record_event_delivered();
        metrics.record_event_ignored();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_opened, 1);
        assert_eq!(snapshot.bytes_received, 192);
        assert_eq!(snapshot.frames_decoded, 2);
        assert_eq!(snapshot.events_delivered, 1);
        assert_eq!(snapshot.events_ignored, 1);
        assert!((snapshot.delivery_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = DefaultStreamMetrics::new();
        metrics.record_malformed_event();
        metrics.record_connection_failed();
        metrics.reset();

        assert_eq!(metrics.snapshot(), StreamMetricsSnapshot::default());
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoopStreamMetrics;
        metrics.record_frame();
        assert_eq!(metrics.snapshot().frames_decoded, 0);
    }
}
