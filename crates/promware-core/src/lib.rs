//! promware core: metric registry, metric families, and the Prometheus text
//! exposition encoder.
//!
//! This crate carries no HTTP or async runtime dependency so it can be shared
//! by the axum integration, background snapshot jobs, and tests alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Instrumentation must never take a process down: every fallible path
//! surfaces as `PromwareError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod exposition;
pub mod registry;

pub use error::{ErrorCode, PromwareError, Result};
pub use registry::{
    Collector, Counter, Gauge, Histogram, HistogramSnapshot, MetricDesc, MetricKind, Registry,
};
