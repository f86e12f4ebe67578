//! Shared metrics state handed to the middleware and the ops handlers.
//!
//! One `MetricsState` bundles the registry with the recorders built on top
//! of it. Cloning is cheap; every clone shares the same series.

use std::sync::Arc;

use promware_core::error::Result;
use promware_core::Registry;

use crate::config::MiddlewareConfig;
use crate::obs::{ApiMetrics, StreamingMetrics};

#[derive(Clone)]
pub struct MetricsState {
    inner: Arc<MetricsStateInner>,
}

struct MetricsStateInner {
    cfg: MiddlewareConfig,
    registry: Arc<Registry>,
    api: Arc<ApiMetrics>,
    streams: Arc<StreamingMetrics>,
}

impl MetricsState {
    /// Build state against an explicit registry.
    /// Returns Result so invalid config surfaces at startup, not per request.
    pub fn new(cfg: MiddlewareConfig, registry: Arc<Registry>) -> Result<Self> {
        cfg.validate()?;

        let api = Arc::new(ApiMetrics::new(&registry, &cfg.prefix));
        let streams = Arc::new(StreamingMetrics::new(&registry, &cfg.prefix));

        tracing::debug!(prefix = %cfg.prefix, skip = ?cfg.skip_paths, "metrics state ready");

        Ok(Self {
            inner: Arc::new(MetricsStateInner {
                cfg,
                registry,
                api,
                streams,
            }),
        })
    }

    /// Build state against the process-wide registry.
    pub fn with_global_registry(cfg: MiddlewareConfig) -> Result<Self> {
        Self::new(cfg, Registry::global())
    }

    pub fn config(&self) -> &MiddlewareConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn api(&self) -> Arc<ApiMetrics> {
        Arc::clone(&self.inner.api)
    }

    pub fn streams(&self) -> Arc<StreamingMetrics> {
        Arc::clone(&self.inner.streams)
    }
}
