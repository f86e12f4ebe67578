use std::panic::Location;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use bytes::Bytes;
use futures_util::Stream;

use super::wrapper::{Chunk, MetricsStream};
use crate::obs::{module_from_location, StreamingMetrics};

/// Builds a streaming `Response` whose body is a tracked stream.
pub struct StreamingResponseBuilder {
    metrics: Arc<StreamingMetrics>,
    endpoint: Option<Arc<str>>,
    status: StatusCode,
    headers: HeaderMap,
}

impl StreamingResponseBuilder {
    pub fn new(metrics: Arc<StreamingMetrics>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        Self {
            metrics,
            endpoint: None,
            status: StatusCode::OK,
            headers,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<Arc<str>>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn media_type(mut self, media_type: HeaderValue) -> Self {
        self.headers.insert(CONTENT_TYPE, media_type);
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Wrap `stream` and build the response. Without an explicit endpoint
    /// the caller's module path is used.
    #[track_caller]
    pub fn build<S, T, E>(self, stream: S) -> Response
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Into<Bytes> + Chunk + 'static,
        E: Into<BoxError> + 'static,
    {
        let caller = Location::caller();
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| Arc::from(module_from_location(caller)));
        let tracked = MetricsStream::new(stream, self.metrics, endpoint);
        (self.status, self.headers, Body::from_stream(tracked)).into_response()
    }
}
