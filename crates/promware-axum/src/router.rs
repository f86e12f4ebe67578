//! Router wiring: ops routes and the instrumentation layer.

use axum::middleware::from_fn_with_state;
use axum::{routing::get, Router};

use crate::{app_state::MetricsState, middleware, ops};

/// `/metrics`, `/_healthz` and `/_readyz`.
pub fn ops_routes<S>(state: MetricsState) -> Router<S> {
    Router::new()
        .route("/metrics", get(ops::metrics))
        .route("/_healthz", get(ops::healthz))
        .route("/_readyz", get(ops::readyz))
        .with_state(state)
}

/// Layer `track_requests` over every route currently in `router`.
/// Routes added afterwards are not instrumented.
pub fn instrument<S>(router: Router<S>, state: &MetricsState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(state.clone(), middleware::track_requests))
}
