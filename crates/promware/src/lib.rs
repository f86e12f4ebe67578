//! Top-level facade crate for promware.
//!
//! Re-exports the metric registry and the axum integration so users can depend on a single crate.

pub mod core {
    pub use promware_core::*;
}

pub mod axum {
    pub use promware_axum::*;
}

pub use promware_axum::{track_requests, HandlerError, MetricsState};
pub use promware_core::Registry;
