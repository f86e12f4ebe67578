use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use axum::response::sse::Event;
use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::obs::{module_from_location, short_type_name, StreamingMetrics};

/// An item a tracked stream can yield.
pub trait Chunk {
    /// Size added to `stream_bytes_total`. Text counts characters, raw
    /// buffers count bytes, opaque items count as 1.
    fn chunk_size(&self) -> u64 {
        1
    }

    /// `Some(type name)` when the item is a failure.
    fn error_type(&self) -> Option<&'static str> {
        None
    }
}

impl Chunk for String {
    fn chunk_size(&self) -> u64 {
        self.chars().count() as u64
    }
}

impl Chunk for &str {
    fn chunk_size(&self) -> u64 {
        self.chars().count() as u64
    }
}

impl Chunk for Vec<u8> {
    fn chunk_size(&self) -> u64 {
        self.len() as u64
    }
}

impl Chunk for Bytes {
    fn chunk_size(&self) -> u64 {
        self.len() as u64
    }
}

impl Chunk for Event {}

impl<T: Chunk, E> Chunk for Result<T, E> {
    fn chunk_size(&self) -> u64 {
        match self {
            Ok(v) => v.chunk_size(),
            Err(_) => 0,
        }
    }

    fn error_type(&self) -> Option<&'static str> {
        match self {
            Ok(_) => None,
            Err(_) => Some(short_type_name::<E>()),
        }
    }
}

/// Lifecycle of one stream. `finish` records at most once; dropping an
/// unfinished record finishes it.
struct StreamRecord {
    metrics: Arc<StreamingMetrics>,
    endpoint: Arc<str>,
    started: Instant,
    finished: bool,
}

impl StreamRecord {
    fn start(metrics: Arc<StreamingMetrics>, endpoint: Arc<str>) -> Self {
        metrics.track_stream_started(&endpoint);
        Self {
            metrics,
            endpoint,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.metrics
            .track_stream_finished(&self.endpoint, self.started.elapsed());
    }
}

impl Drop for StreamRecord {
    fn drop(&mut self) {
        self.finish();
    }
}

pin_project! {
    /// Stream adapter that records stream metrics for everything it yields.
    /// Items pass through unchanged.
    ///
    /// After an `Err` item the stream is over: the error is recorded, the
    /// stream finished, and later polls return `None`.
    pub struct MetricsStream<S> {
        #[pin]
        inner: S,
        metrics: Arc<StreamingMetrics>,
        endpoint: Arc<str>,
        record: Option<StreamRecord>,
        done: bool,
    }
}

impl<S> MetricsStream<S> {
    /// Wrap and record the stream start immediately.
    pub fn new(inner: S, metrics: Arc<StreamingMetrics>, endpoint: impl Into<Arc<str>>) -> Self {
        let endpoint = endpoint.into();
        let record = StreamRecord::start(Arc::clone(&metrics), Arc::clone(&endpoint));
        Self {
            inner,
            metrics,
            endpoint,
            record: Some(record),
            done: false,
        }
    }

    /// Like `new`, labeling the stream with the caller's module path.
    #[track_caller]
    pub fn with_inferred_endpoint(inner: S, metrics: Arc<StreamingMetrics>) -> Self {
        let endpoint = module_from_location(Location::caller());
        Self::new(inner, metrics, endpoint)
    }

    pub(crate) fn lazy(inner: S, metrics: Arc<StreamingMetrics>, endpoint: Arc<str>) -> Self {
        Self {
            inner,
            metrics,
            endpoint,
            record: None,
            done: false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl<S> Stream for MetricsStream<S>
where
    S: Stream,
    S::Item: Chunk,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        let metrics: &Arc<StreamingMetrics> = this.metrics;
        let endpoint: &Arc<str> = this.endpoint;
        let record = this
            .record
            .get_or_insert_with(|| StreamRecord::start(Arc::clone(metrics), Arc::clone(endpoint)));

        match ready!(this.inner.poll_next(cx)) {
            Some(item) => {
                if let Some(error_type) = item.error_type() {
                    metrics.track_stream_error(endpoint, error_type);
                    tracing::error!(endpoint = %endpoint, error_type, "error in streaming response");
                    record.finish();
                    *this.done = true;
                } else {
                    metrics.track_stream_chunk(endpoint, item.chunk_size());
                }
                Poll::Ready(Some(item))
            }
            None => {
                record.finish();
                *this.done = true;
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            self.inner.size_hint()
        }
    }
}

/// Wrap `stream` under an explicit endpoint. The start is recorded on the
/// first poll, so a stream that is never polled leaves no trace.
pub fn track_stream<S>(metrics: Arc<StreamingMetrics>, stream: S, endpoint: impl Into<Arc<str>>) -> MetricsStream<S>
where
    S: Stream,
    S::Item: Chunk,
{
    MetricsStream::lazy(stream, metrics, endpoint.into())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures_util::{stream, StreamExt};
    use promware_core::Registry;

    use super::*;

    fn metrics(reg: &Registry) -> Arc<StreamingMetrics> {
        Arc::new(StreamingMetrics::new(reg, "t"))
    }

    #[test]
    fn chunk_sizes() {
        assert_eq!("héllo".chunk_size(), 5);
        assert_eq!(String::from("日本").chunk_size(), 2);
        assert_eq!("héllo".as_bytes().to_vec().chunk_size(), 6);
        assert_eq!(Bytes::from_static("日本".as_bytes()).chunk_size(), 6);
        assert_eq!(Event::default().data("x").chunk_size(), 1);
        let err: Result<String, std::fmt::Error> = Err(std::fmt::Error);
        assert_eq!(err.error_type(), Some("Error"));
    }

    #[test]
    fn boxed_stream_errors_name_the_trait_object() {
        let err: Result<&str, axum::BoxError> = Err("upstream gone".into());
        assert_eq!(err.error_type(), Some("dyn Error"));
        let err: Result<&str, Box<std::io::Error>> = Err(Box::new(std::io::Error::other("x")));
        assert_eq!(err.error_type(), Some("Error"));
    }

    #[tokio::test]
    async fn inferred_endpoint_is_the_callers_module() {
        let reg = Registry::new();
        let s = MetricsStream::with_inferred_endpoint(stream::iter(["a"]), metrics(&reg));
        assert_eq!(s.endpoint(), "streaming::wrapper");
        let _: Vec<_> = s.collect().await;
    }

    #[tokio::test]
    async fn lazy_form_starts_on_first_poll() {
        let reg = Registry::new();
        let m = metrics(&reg);
        let ep = [("endpoint", "lazy")];

        let mut s = track_stream(Arc::clone(&m), stream::iter(["ab", "c"]), "lazy");
        assert_eq!(m.active_streams.get(&ep).unwrap(), 0.0);
        assert!(m.duration.get(&ep).unwrap().is_none());

        assert_eq!(s.next().await, Some("ab"));
        assert_eq!(m.active_streams.get(&ep).unwrap(), 1.0);
        assert_eq!(s.next().await, Some("c"));
        assert_eq!(s.next().await, None);
        assert_eq!(s.next().await, None);

        assert_eq!(m.active_streams.get(&ep).unwrap(), 0.0);
        assert_eq!(m.bytes.get(&ep).unwrap(), 3.0);
        assert_eq!(m.duration.get(&ep).unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn dropping_an_unfinished_stream_finishes_it() {
        let reg = Registry::new();
        let m = metrics(&reg);
        let ep = [("endpoint", "cancelled")];

        let mut s = MetricsStream::new(stream::iter(["a", "b", "c"]), Arc::clone(&m), "cancelled");
        assert_eq!(s.next().await, Some("a"));
        drop(s);

        assert_eq!(m.active_streams.get(&ep).unwrap(), 0.0);
        assert_eq!(m.chunks.get(&ep).unwrap(), 1.0);
        assert_eq!(m.duration.get(&ep).unwrap().unwrap().count, 1);
    }
}
