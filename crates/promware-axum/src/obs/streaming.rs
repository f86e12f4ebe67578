//! Streaming response metrics, labeled by endpoint only.

use std::time::Duration;

use promware_core::{Counter, Gauge, Histogram, Registry};

use super::record;

pub const STREAM_DURATION_BUCKETS: [f64; 11] =
    [0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

pub struct StreamingMetrics {
    pub active_streams: Gauge,
    pub chunks: Counter,
    pub bytes: Counter,
    pub duration: Histogram,
    pub errors: Counter,
}

impl StreamingMetrics {
    pub fn new(registry: &Registry, prefix: &str) -> Self {
        Self {
            active_streams: registry.get_or_create_gauge(
                &format!("{prefix}_active_streams"),
                "Number of active streaming responses",
                &["endpoint"],
            ),
            chunks: registry.get_or_create_counter(
                &format!("{prefix}_stream_chunks_total"),
                "Total number of chunks sent in streaming responses",
                &["endpoint"],
            ),
            bytes: registry.get_or_create_counter(
                &format!("{prefix}_stream_bytes_total"),
                "Total bytes sent in streaming responses",
                &["endpoint"],
            ),
            duration: registry.get_or_create_histogram(
                &format!("{prefix}_stream_duration_seconds"),
                "Duration of streaming responses in seconds",
                &["endpoint"],
                &STREAM_DURATION_BUCKETS,
            ),
            errors: registry.get_or_create_counter(
                &format!("{prefix}_stream_errors_total"),
                "Total number of errors in streaming responses",
                &["endpoint", "error_type"],
            ),
        }
    }

    pub fn track_stream_started(&self, endpoint: &str) {
        record("stream_started", self.active_streams.inc(&[("endpoint", endpoint)]));
    }

    pub fn track_stream_chunk(&self, endpoint: &str, chunk_size: u64) {
        record("stream_chunk", self.chunks.inc(&[("endpoint", endpoint)]));
        record("stream_chunk", self.bytes.add(&[("endpoint", endpoint)], chunk_size as f64));
    }

    pub fn track_stream_finished(&self, endpoint: &str, duration: Duration) {
        record("stream_finished", self.active_streams.dec(&[("endpoint", endpoint)]));
        record(
            "stream_finished",
            self.duration.observe(&[("endpoint", endpoint)], duration.as_secs_f64()),
        );
    }

    pub fn track_stream_error(&self, endpoint: &str, error_type: &str) {
        record(
            "stream_error",
            self.errors.inc(&[("endpoint", endpoint), ("error_type", error_type)]),
        );
    }
}
