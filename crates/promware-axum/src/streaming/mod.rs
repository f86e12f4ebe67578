//! Streaming response tracking.
//!
//! Three ways in, all with the same guarantees (start once, one chunk
//! record per item, finish exactly once on completion, error or drop):
//! - `MetricsStream::new` / `with_inferred_endpoint` wrap a stream eagerly
//! - `track_stream` wraps lazily, starting on the first poll
//! - `StreamFn` wraps a stream-producing async function
//!
//! `StreamingResponseBuilder` turns any of these into an axum `Response`.

pub mod adapter;
pub mod response;
pub mod wrapper;

pub use adapter::StreamFn;
pub use response::StreamingResponseBuilder;
pub use wrapper::{track_stream, Chunk, MetricsStream};
