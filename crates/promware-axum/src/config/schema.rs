use serde::Deserialize;
use promware_core::error::{PromwareError, Result};

/// Top-level file for the bundled service binary.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PromwareError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.middleware.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Write a registry snapshot here periodically (disabled when absent).
    #[serde(default)]
    pub snapshot_path: Option<String>,

    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            snapshot_path: None,
            snapshot_interval_secs: default_snapshot_interval_secs(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=3600).contains(&self.snapshot_interval_secs) {
            return Err(PromwareError::Config(
                "server.snapshot_interval_secs must be between 1 and 3600".into(),
            ));
        }
        Ok(())
    }
}

/// Middleware options.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Namespace for every metric name.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Exact request paths that bypass all instrumentation.
    #[serde(default = "default_skip_paths")]
    pub skip_paths: Vec<String>,

    /// Emit one info/error log entry per request.
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,

    /// Header carrying the JSON user context.
    #[serde(default = "default_user_data_header")]
    pub user_data_header: String,

    /// Request bodies are buffered (size metric, JSON log) up to this limit.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            skip_paths: default_skip_paths(),
            log_requests: default_log_requests(),
            user_data_header: default_user_data_header(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl MiddlewareConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|p| p == path)
    }

    pub fn validate(&self) -> Result<()> {
        let mut chars = self.prefix.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':');
        if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':') {
            return Err(PromwareError::Config(format!(
                "middleware.prefix is not a valid metric name: {:?}",
                self.prefix
            )));
        }
        if let Some(p) = self.skip_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(PromwareError::Config(format!(
                "middleware.skip_paths entries must start with '/': {p:?}"
            )));
        }
        if self.user_data_header.is_empty() {
            return Err(PromwareError::Config(
                "middleware.user_data_header must not be empty".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(PromwareError::Config(
                "middleware.max_body_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_snapshot_interval_secs() -> u64 {
    10
}
fn default_prefix() -> String {
    "fastapi".into()
}
fn default_skip_paths() -> Vec<String> {
    vec!["/metrics".into(), "/_readyz".into(), "/_healthz".into()]
}
fn default_log_requests() -> bool {
    true
}
fn default_user_data_header() -> String {
    "x-user-data".into()
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
