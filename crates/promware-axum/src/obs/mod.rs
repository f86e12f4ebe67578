//! Request, streaming and exception recorders.
//!
//! All recorders share one rule: a failed metric update (label mismatch,
//! negative increment) is logged at warning level and skipped. Metrics code
//! never fails the business request.

pub mod api;
pub mod exception;
pub mod streaming;

pub use api::{ApiMetrics, RequestRecord};
pub use exception::{module_from_location, short_type_name};
pub use streaming::StreamingMetrics;

/// Error boundary for a single metric update.
pub(crate) fn record(op: &'static str, res: promware_core::Result<()>) {
    if let Err(e) = res {
        tracing::warn!(op, code = e.code().as_str(), error = %e, "metric update skipped");
    }
}
