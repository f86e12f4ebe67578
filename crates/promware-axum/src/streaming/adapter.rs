use std::future::Future;
use std::sync::Arc;

use futures_util::Stream;

use super::wrapper::{Chunk, MetricsStream};
use crate::obs::StreamingMetrics;

/// Wraps a stream-producing async function so every stream it returns is
/// tracked. The endpoint defaults to the function's path
/// (`my_app::handlers::chat_stream`).
pub struct StreamFn<F> {
    metrics: Arc<StreamingMetrics>,
    f: F,
    endpoint: Arc<str>,
}

impl<F> StreamFn<F> {
    pub fn new(metrics: Arc<StreamingMetrics>, f: F) -> Self {
        Self {
            metrics,
            f,
            endpoint: Arc::from(fn_endpoint::<F>()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<Arc<str>>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call<A, Fut, S>(&self, args: A) -> MetricsStream<S>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = S>,
        S: Stream,
        S::Item: Chunk,
    {
        let stream = (self.f)(args).await;
        MetricsStream::new(stream, Arc::clone(&self.metrics), Arc::clone(&self.endpoint))
    }
}

/// Path of a function item type without generic arguments or closure
/// markers.
fn fn_endpoint<F>() -> String {
    let full = std::any::type_name::<F>();
    let mut path = full.split('<').next().unwrap_or(full);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    if path.is_empty() {
        "unknown".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures_util::{stream, StreamExt};
    use promware_core::Registry;

    use super::*;

    async fn countdown(n: usize) -> impl Stream<Item = String> {
        stream::iter((0..n).rev().map(|i| i.to_string()))
    }

    #[tokio::test]
    async fn endpoint_is_the_function_path() {
        let reg = Registry::new();
        let m = Arc::new(StreamingMetrics::new(&reg, "t"));
        let tracked = StreamFn::new(Arc::clone(&m), countdown);
        assert!(tracked.endpoint().ends_with("streaming::adapter::tests::countdown"));

        let items: Vec<String> = tracked.call(3).await.collect().await;
        assert_eq!(items, ["2", "1", "0"]);
        let ep = [("endpoint", tracked.endpoint())];
        assert_eq!(m.chunks.get(&ep).unwrap(), 3.0);
    }

    #[tokio::test]
    async fn explicit_endpoint_wins() {
        let reg = Registry::new();
        let m = Arc::new(StreamingMetrics::new(&reg, "t"));
        let tracked = StreamFn::new(m, countdown).with_endpoint("countdown");
        assert_eq!(tracked.endpoint(), "countdown");
        assert_eq!(tracked.call(1).await.count().await, 1);
    }
}
