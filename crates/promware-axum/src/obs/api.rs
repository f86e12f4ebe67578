//! Per-request metrics (`<prefix>_http_*`, sizes, errors, token usage,
//! exceptions).

use std::time::{Duration, Instant};

use axum::body::HttpBody;
use axum::extract::MatchedPath;
use axum::http::request::Parts;
use axum::response::Response;

use promware_core::{Counter, Gauge, Histogram, Registry};

use super::record;

pub const DURATION_BUCKETS: [f64; 17] = [
    0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 25.0, 50.0, 75.0,
    100.0,
];

pub const SIZE_BUCKETS: [f64; 6] = [10.0, 100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0];

/// What the recorders need to know about one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    /// Route template when the router matched one, raw path otherwise.
    pub endpoint: String,
    pub body_size: usize,
    pub started: Instant,
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>, body_size: usize) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            body_size,
            started: Instant::now(),
        }
    }

    /// Build from request parts, resolving the endpoint label.
    ///
    /// The raw-path fallback has unbounded cardinality; it only applies to
    /// requests no route matched (404s, nested fallbacks).
    pub fn from_parts(parts: &Parts, body_size: usize, started: Instant) -> Self {
        let endpoint = parts
            .extensions
            .get::<MatchedPath>()
            .map(|mp| mp.as_str().to_owned())
            .unwrap_or_else(|| parts.uri.path().to_owned());
        Self {
            method: parts.method.as_str().to_owned(),
            endpoint,
            body_size,
            started,
        }
    }
}

pub struct ApiMetrics {
    prefix: String,
    pub http_requests: Counter,
    pub http_request_duration: Histogram,
    pub active_requests: Gauge,
    pub request_size: Histogram,
    pub response_size: Histogram,
    pub errors: Counter,
    pub token_usage: Counter,
    pub exceptions: Counter,
    pub global_exceptions: Counter,
}

impl ApiMetrics {
    /// Create (or reuse) every request metric under `prefix`.
    pub fn new(registry: &Registry, prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            http_requests: registry.get_or_create_counter(
                &format!("{prefix}_http_requests_total"),
                "Total number of HTTP requests",
                &["method", "endpoint", "status_code"],
            ),
            http_request_duration: registry.get_or_create_histogram(
                &format!("{prefix}_http_request_duration_seconds"),
                "HTTP request duration in seconds",
                &["method", "endpoint"],
                &DURATION_BUCKETS,
            ),
            active_requests: registry.get_or_create_gauge(
                &format!("{prefix}_active_requests"),
                "Number of active requests",
                &["method", "endpoint"],
            ),
            request_size: registry.get_or_create_histogram(
                &format!("{prefix}_request_size_bytes"),
                "Request size in bytes",
                &["method", "endpoint"],
                &SIZE_BUCKETS,
            ),
            response_size: registry.get_or_create_histogram(
                &format!("{prefix}_response_size_bytes"),
                "Response size in bytes",
                &["method", "endpoint", "status_code"],
                &SIZE_BUCKETS,
            ),
            errors: registry.get_or_create_counter(
                &format!("{prefix}_errors_total"),
                "Total number of errors",
                &["method", "endpoint", "error_type"],
            ),
            token_usage: registry.get_or_create_counter(
                &format!("{prefix}_token_usage_total"),
                "Total number of tokens used",
                &["type"],
            ),
            exceptions: registry.get_or_create_counter(
                &format!("{prefix}_exceptions_total"),
                "Total number of exceptions",
                &["exception_type", "module", "code"],
            ),
            global_exceptions: registry.get_or_create_counter(
                &format!("{prefix}_global_exceptions_total"),
                "Total number of exceptions across the entire application",
                &[],
            ),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn track_request_started(&self, req: &RequestRecord) {
        let labels = [("method", req.method.as_str()), ("endpoint", req.endpoint.as_str())];
        record("request_started", self.request_size.observe(&labels, req.body_size as f64));
        record("request_started", self.active_requests.inc(&labels));
    }

    /// Duration, request count and (when the body length is known) response size.
    pub fn track_request_completed(&self, req: &RequestRecord, response: &Response, duration: Duration) {
        let status = response.status().as_u16().to_string();
        let labels = [("method", req.method.as_str()), ("endpoint", req.endpoint.as_str())];
        let with_status = [
            ("method", req.method.as_str()),
            ("endpoint", req.endpoint.as_str()),
            ("status_code", status.as_str()),
        ];

        record(
            "request_completed",
            self.http_request_duration.observe(&labels, duration.as_secs_f64()),
        );
        record("request_completed", self.http_requests.inc(&with_status));

        if let Some(len) = response.body().size_hint().exact().filter(|n| *n > 0) {
            record("request_completed", self.response_size.observe(&with_status, len as f64));
        }
    }

    pub fn track_request_error(&self, req: &RequestRecord, status_code: u16, error_type: &str, duration: Duration) {
        let status = status_code.to_string();
        let labels = [("method", req.method.as_str()), ("endpoint", req.endpoint.as_str())];

        record(
            "request_error",
            self.http_request_duration.observe(&labels, duration.as_secs_f64()),
        );
        record(
            "request_error",
            self.http_requests.inc(&[
                ("method", req.method.as_str()),
                ("endpoint", req.endpoint.as_str()),
                ("status_code", status.as_str()),
            ]),
        );
        record(
            "request_error",
            self.errors.inc(&[
                ("method", req.method.as_str()),
                ("endpoint", req.endpoint.as_str()),
                ("error_type", error_type),
            ]),
        );
    }

    /// Cleanup hook: must run exactly once per tracked request.
    pub fn track_request_finished(&self, req: &RequestRecord) {
        record(
            "request_finished",
            self.active_requests
                .dec(&[("method", req.method.as_str()), ("endpoint", req.endpoint.as_str())]),
        );
    }

    pub fn track_token_usage(&self, input_tokens: u64, output_tokens: u64, total_tokens: u64) {
        for (kind, n) in [("input", input_tokens), ("output", output_tokens), ("total", total_tokens)] {
            record("token_usage", self.token_usage.add(&[("type", kind)], n as f64));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn labels<'a>(r: &'a RequestRecord) -> [(&'static str, &'a str); 2] {
        [("method", r.method.as_str()), ("endpoint", r.endpoint.as_str())]
    }

    #[test]
    fn endpoint_falls_back_to_raw_path_without_a_matched_route() {
        let (parts, _) = axum::http::Request::builder()
            .method("DELETE")
            .uri("/orphan/7?x=1")
            .body(())
            .unwrap()
            .into_parts();
        let r = RequestRecord::from_parts(&parts, 0, Instant::now());
        assert_eq!((r.method.as_str(), r.endpoint.as_str()), ("DELETE", "/orphan/7"));
    }

    #[test]
    fn started_then_finished_balances_active_gauge() {
        let reg = Registry::new();
        let m = ApiMetrics::new(&reg, "t");
        let r = RequestRecord::new("GET", "/items/:id", 42);

        m.track_request_started(&r);
        assert_eq!(m.active_requests.get(&labels(&r)).unwrap(), 1.0);
        m.track_request_finished(&r);
        assert_eq!(m.active_requests.get(&labels(&r)).unwrap(), 0.0);

        let size = m.request_size.get(&labels(&r)).unwrap().unwrap();
        assert_eq!((size.count, size.sum), (1, 42.0));
    }

    #[test]
    fn completed_records_response_size_only_for_known_bodies() {
        let reg = Registry::new();
        let m = ApiMetrics::new(&reg, "t");
        let r = RequestRecord::new("GET", "/", 0);
        let with_status = [("method", "GET"), ("endpoint", "/"), ("status_code", "200")];

        let resp = Response::new(Body::from("hello"));
        m.track_request_completed(&r, &resp, Duration::from_millis(5));
        let empty = Response::new(Body::empty());
        m.track_request_completed(&r, &empty, Duration::from_millis(5));

        assert_eq!(m.http_requests.get(&with_status).unwrap(), 2.0);
        let size = m.response_size.get(&with_status).unwrap().unwrap();
        assert_eq!((size.count, size.sum), (1, 5.0));
    }

    #[test]
    fn error_counts_request_and_error_type() {
        let reg = Registry::new();
        let m = ApiMetrics::new(&reg, "t");
        let r = RequestRecord::new("POST", "/risky", 0);

        m.track_request_error(&r, StatusCode::INTERNAL_SERVER_ERROR.as_u16(), "ZeroDivisionError", Duration::ZERO);

        let total = [("method", "POST"), ("endpoint", "/risky"), ("status_code", "500")];
        let errors = [("method", "POST"), ("endpoint", "/risky"), ("error_type", "ZeroDivisionError")];
        assert_eq!(m.http_requests.get(&total).unwrap(), 1.0);
        assert_eq!(m.errors.get(&errors).unwrap(), 1.0);
        assert_eq!(m.http_request_duration.get(&labels(&r)).unwrap().unwrap().count, 1);
    }

    #[test]
    fn token_usage_by_type() {
        let reg = Registry::new();
        let m = ApiMetrics::new(&reg, "t");
        m.track_token_usage(3, 20, 23);
        m.track_token_usage(1, 1, 2);
        assert_eq!(m.token_usage.get(&[("type", "input")]).unwrap(), 4.0);
        assert_eq!(m.token_usage.get(&[("type", "output")]).unwrap(), 21.0);
        assert_eq!(m.token_usage.get(&[("type", "total")]).unwrap(), 25.0);
    }

    #[test]
    fn two_instances_share_the_registry_series() {
        let reg = Registry::new();
        let a = ApiMetrics::new(&reg, "dup");
        let b = ApiMetrics::new(&reg, "dup");
        a.track_token_usage(1, 0, 1);
        b.track_token_usage(1, 0, 1);
        assert_eq!(a.token_usage.get(&[("type", "total")]).unwrap(), 2.0);
        assert!(reg.get("dup_token_usage_total_new").is_none());
    }
}
