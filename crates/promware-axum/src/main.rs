//! promware demo service.
//!
//! - `GET /`, `GET /items/:item_id` : plain JSON handlers
//! - `POST /generate` : records token usage
//! - `POST /risky` : fails with a typed error (500)
//! - `GET /stream` : tracked event stream
//! - `/metrics`, `/_healthz`, `/_readyz` : ops (not instrumented)
//!
//! Reads `promware.yaml` when present, defaults otherwise.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use promware_axum::config::{self, ServiceConfig};
use promware_axum::context::record_token_usage;
use promware_axum::streaming::StreamingResponseBuilder;
use promware_axum::{ops, router, HandlerError, MetricsState};
use promware_core::error::{PromwareError, Result};

const CONFIG_PATH: &str = "promware.yaml";

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
struct ZeroDivisionError;

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    prompt: String,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

async fn read_item(UrlPath(item_id): UrlPath<u64>) -> Json<Value> {
    Json(json!({ "item_id": item_id }))
}

async fn generate(Json(req): Json<GenerateRequest>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let input = req.prompt.split_whitespace().count() as u64;
    record_token_usage(input, 20);
    Json(json!({ "text": format!("Generated text based on: {}", req.prompt) }))
}

async fn risky() -> std::result::Result<Json<Value>, HandlerError> {
    let divisor: i64 = 0;
    let result = 1_i64.checked_div(divisor).ok_or(ZeroDivisionError)?;
    Ok(Json(json!({ "result": result })))
}

async fn stream_data(State(state): State<MetricsState>) -> Response {
    let events = stream::iter(0..10).then(|i| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, Infallible>(format!("data: {i}\n\n"))
    });
    StreamingResponseBuilder::new(state.streams())
        .endpoint("/stream")
        .build(events)
}

fn load_config() -> Result<ServiceConfig> {
    if Path::new(CONFIG_PATH).exists() {
        config::load_from_file(CONFIG_PATH)
    } else {
        config::load_from_str("version: 1\n")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = load_config()?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| PromwareError::Config(format!("server.listen must be a valid SocketAddr: {e}")))?;

    let state = MetricsState::with_global_registry(cfg.middleware)?;

    let app = Router::new()
        .route("/", get(root))
        .route("/items/:item_id", get(read_item))
        .route("/generate", post(generate))
        .route("/risky", post(risky))
        .route("/stream", get(stream_data))
        .with_state(state.clone());
    let app = router::instrument(app, &state).merge(router::ops_routes(state.clone()));

    let _snapshot = cfg.server.snapshot_path.map(|path| {
        ops::spawn_snapshot_task(
            state.registry(),
            PathBuf::from(path),
            Duration::from_secs(cfg.server.snapshot_interval_secs),
        )
    });

    tracing::info!(%listen, prefix = %state.config().prefix, "promware demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
