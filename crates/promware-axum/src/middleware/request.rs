//! Request/response summaries for the per-request log entry.

use axum::body::HttpBody;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::context::UserData;

/// Parsed request body for logging. Empty, multipart and non-JSON bodies
/// all log as `{}`.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> Value {
    let multipart = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if body.is_empty() || multipart {
        return Value::Object(Map::new());
    }
    serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[derive(Debug)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
    pub user_id: Option<i64>,
}

impl RequestSummary {
    pub fn new(parts: &Parts, body: Value, user: Option<&UserData>) -> Self {
        Self {
            method: parts.method.as_str().to_owned(),
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            body,
            user_id: user.and_then(|u| u.user_id),
        }
    }
}

/// Coarse shape of a response, logged in place of its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Length unknown up front (event streams, `Body::from_stream`).
    Streaming,
    /// Rendered HTML.
    Template,
    Buffered,
    Empty,
}

impl ResponseKind {
    pub fn of(resp: &Response) -> Self {
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        match resp.body().size_hint().exact() {
            _ if content_type.starts_with("text/event-stream") => ResponseKind::Streaming,
            None => ResponseKind::Streaming,
            Some(0) => ResponseKind::Empty,
            Some(_) if content_type.starts_with("text/html") => ResponseKind::Template,
            Some(_) => ResponseKind::Buffered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Streaming => "streaming",
            ResponseKind::Template => "template",
            ResponseKind::Buffered => "buffered",
            ResponseKind::Empty => "empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;
    use axum::response::{Html, IntoResponse};
    use futures_util::stream;

    use super::*;

    #[test]
    fn body_falls_back_to_empty_object() {
        let mut h = HeaderMap::new();
        assert_eq!(parse_body(&h, b""), serde_json::json!({}));
        assert_eq!(parse_body(&h, b"not json"), serde_json::json!({}));
        assert_eq!(parse_body(&h, br#"{"a":1}"#), serde_json::json!({"a": 1}));

        h.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=x"),
        );
        assert_eq!(parse_body(&h, br#"{"a":1}"#), serde_json::json!({}));
    }

    #[test]
    fn classifies_responses() {
        assert_eq!(ResponseKind::of(&Response::new(Body::empty())), ResponseKind::Empty);
        assert_eq!(ResponseKind::of(&"hi".into_response()), ResponseKind::Buffered);
        assert_eq!(
            ResponseKind::of(&Html("<p>hi</p>").into_response()),
            ResponseKind::Template
        );

        let chunks = stream::iter([Ok::<_, std::io::Error>("a")]);
        let streamed = Response::new(Body::from_stream(chunks));
        assert_eq!(ResponseKind::of(&streamed), ResponseKind::Streaming);
    }
}
