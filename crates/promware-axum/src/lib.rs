//! promware axum integration.
//!
//! Request and streaming metrics for axum services: the `track_requests`
//! middleware, stream wrappers, the token-usage scope, ops endpoints and
//! the YAML config they share. Metric storage lives in `promware-core`.

pub mod app_state;
pub mod config;
pub mod context;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod router;
pub mod streaming;

pub use app_state::MetricsState;
pub use middleware::{track_requests, HandlerError};
