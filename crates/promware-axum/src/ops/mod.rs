//! Operational HTTP endpoints and registry dumps.
//!
//! - `/_healthz` : liveness
//! - `/_readyz`  : readiness
//! - `/metrics`  : Prometheus text format

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;

use promware_core::exposition::CONTENT_TYPE;
use promware_core::Registry;

use crate::app_state::MetricsState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

pub async fn metrics(State(state): State<MetricsState>) -> Response {
    let body = state.registry().render();
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Write the exposition text to `path`. Failures are logged, not returned.
pub async fn dump_to_file(registry: &Registry, path: impl AsRef<Path>) {
    let path = path.as_ref();
    if let Err(e) = tokio::fs::write(path, registry.render()).await {
        tracing::error!(path = %path.display(), error = %e, "failed to write metrics to file");
    }
}

/// Dump the registry to `path` every `interval` until the task is aborted.
pub fn spawn_snapshot_task(registry: Arc<Registry>, path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            dump_to_file(&registry, &path).await;
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn dump_writes_rendered_text() {
        let reg = Registry::new();
        reg.get_or_create_counter("dump_total", "Dumped", &[]).inc(&[]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        dump_to_file(&reg, &path).await;

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# TYPE dump_total counter"));
        assert!(text.contains("\ndump_total 1\n"));
    }

    #[tokio::test]
    async fn dump_to_missing_directory_is_swallowed() {
        let reg = Registry::new();
        let dir = tempfile::tempdir().unwrap();
        dump_to_file(&reg, dir.path().join("nope/metrics.prom")).await;
        assert!(!dir.path().join("nope").exists());
    }

    #[tokio::test]
    async fn snapshot_task_writes_on_first_tick() {
        let reg = Arc::new(Registry::new());
        reg.get_or_create_gauge("snap_gauge", "Snapshot", &[]).set(&[], 2.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.prom");

        let handle = spawn_snapshot_task(Arc::clone(&reg), path.clone(), Duration::from_secs(3600));
        let mut text = String::new();
        for _ in 0..200 {
            text = std::fs::read_to_string(&path).unwrap_or_default();
            if text.contains("snap_gauge 2") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(text.contains("snap_gauge 2"), "snapshot not written: {text:?}");
    }
}
