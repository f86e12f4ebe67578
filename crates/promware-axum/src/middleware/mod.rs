//! Request instrumentation middleware.
//!
//! Lifecycle per instrumented request:
//! - open a zeroed token scope and record the start (body buffered first)
//! - dispatch, catching panics
//! - on success record completion; on a handler failure record the error
//!   and answer with the JSON error body
//! - always record finish and flush token usage (drop guard)
//!
//! Paths in `skip_paths` are dispatched untouched.

pub mod error;
pub mod request;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;

use crate::app_state::MetricsState;
use crate::context::{parse_user_data, TokenScope};
use crate::obs::{ApiMetrics, RequestRecord};

pub use error::{error_response, HandlerError, HandlerFailure};
pub use request::{parse_body, RequestSummary, ResponseKind};

/// Middleware entry point; install with
/// `axum::middleware::from_fn_with_state(state, track_requests)`.
pub async fn track_requests(State(state): State<MetricsState>, req: Request, next: Next) -> Response {
    if state.config().is_skipped(req.uri().path()) {
        return next.run(req).await;
    }

    let scope = TokenScope::new();
    scope.clone().run(instrumented(state, scope, req, next)).await
}

/// Runs the finish step exactly once, on every exit path including
/// cancellation of the middleware future.
struct FinishGuard {
    api: Arc<ApiMetrics>,
    record: RequestRecord,
    scope: TokenScope,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.api.track_request_finished(&self.record);

        let usage = self.scope.snapshot();
        if usage.total_tokens > 0 {
            self.api
                .track_token_usage(usage.input_tokens, usage.output_tokens, usage.total_tokens);
        }
        self.scope.reset();
    }
}

async fn instrumented(state: MetricsState, scope: TokenScope, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let cfg = state.config();
    let api = state.api();

    let (mut parts, body) = req.into_parts();
    let read = axum::body::to_bytes(body, cfg.max_body_bytes).await;
    let body_size = read.as_ref().map_or(0, |b| b.len());

    let record = RequestRecord::from_parts(&parts, body_size, started);
    let guard = FinishGuard {
        api: Arc::clone(&api),
        record,
        scope,
    };
    api.track_request_started(&guard.record);

    let bytes = match read {
        Ok(bytes) => bytes,
        Err(e) => {
            let failure = HandlerFailure {
                status: Some(body_error_status(&parts, cfg.max_body_bytes)),
                error_type: Arc::from("BodyReadError"),
                module: Arc::from("middleware"),
                message: Arc::from(format!("failed to read request body: {e}")),
            };
            let summary = RequestSummary::new(&parts, serde_json::json!({}), None);
            return fail(&state, &guard.record, &summary, failure);
        }
    };

    let user = parse_user_data(&parts.headers, &cfg.user_data_header);
    let summary = RequestSummary::new(&parts, parse_body(&parts.headers, &bytes), user.as_ref());
    if let Some(user) = user {
        parts.extensions.insert(user);
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    let outcome = AssertUnwindSafe(next.run(req)).catch_unwind().await;

    let resp = match outcome {
        Ok(resp) => match resp.extensions().get::<HandlerFailure>().cloned() {
            Some(failure) => return fail(&state, &guard.record, &summary, failure),
            None => resp,
        },
        Err(payload) => {
            let failure = HandlerFailure::from_panic(&*payload);
            return fail(&state, &guard.record, &summary, failure);
        }
    };

    let elapsed = started.elapsed();
    if cfg.log_requests {
        tracing::info!(
            status = resp.status().as_u16(),
            api_time = elapsed.as_secs_f64(),
            endpoint = %guard.record.endpoint,
            request = ?summary,
            response = ResponseKind::of(&resp).as_str(),
            "request completed"
        );
    }
    api.track_request_completed(&guard.record, &resp, elapsed);

    resp
}

fn fail(state: &MetricsState, record: &RequestRecord, summary: &RequestSummary, failure: HandlerFailure) -> Response {
    let api = state.api();
    let status = failure.status();
    let elapsed = record.started.elapsed();

    api.track_request_error(record, status.as_u16(), &failure.error_type, elapsed);
    api.record_exception(
        &failure.error_type,
        &failure.module,
        Some(status.as_u16()),
        &failure.message,
    );

    if state.config().log_requests {
        tracing::error!(
            status = status.as_u16(),
            api_time = elapsed.as_secs_f64(),
            endpoint = %record.endpoint,
            request = ?summary,
            error = %failure.message,
            "exception occurred for {}",
            summary.path
        );
    }

    error_response(status, vec![failure.message.to_string()])
}

/// 413 when the declared length is over the limit, 400 for any other read
/// failure (including chunked bodies that overrun it).
fn body_error_status(parts: &Parts, limit: usize) -> StatusCode {
    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    match declared {
        Some(n) if n > limit => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    }
}
