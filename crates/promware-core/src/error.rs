//! Shared error type across promware crates.

use thiserror::Error;

/// Stable error codes (safe to surface in logs and JSON bodies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Metric or label name rejected by the exposition grammar.
    InvalidName,
    /// Metric name already taken in the registry.
    AlreadyRegistered,
    /// Histogram bounds not finite/ascending.
    InvalidBuckets,
    /// Label set does not match the declared label names.
    LabelMismatch,
    /// Counter asked to go backwards.
    NegativeIncrement,
    /// Invalid configuration.
    Config,
    /// Filesystem failure.
    Io,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::AlreadyRegistered => "ALREADY_REGISTERED",
            ErrorCode::InvalidBuckets => "INVALID_BUCKETS",
            ErrorCode::LabelMismatch => "LABEL_MISMATCH",
            ErrorCode::NegativeIncrement => "NEGATIVE_INCREMENT",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PromwareError>;

/// Unified error type used by core and the axum integration.
#[derive(Debug, Error)]
pub enum PromwareError {
    #[error("invalid metric name: {0}")]
    InvalidName(String),
    #[error("invalid label name {label:?} on metric {metric}")]
    InvalidLabel { metric: String, label: String },
    #[error("metric already registered: {0}")]
    AlreadyRegistered(String),
    #[error("invalid histogram buckets for {0}: bounds must be finite and strictly ascending")]
    InvalidBuckets(String),
    #[error("label mismatch on {metric}: expected [{expected}], got [{got}]")]
    LabelMismatch {
        metric: String,
        expected: String,
        got: String,
    },
    #[error("counter {0} cannot be decremented")]
    NegativeIncrement(String),
    #[error("config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PromwareError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PromwareError::InvalidName(_) | PromwareError::InvalidLabel { .. } => {
                ErrorCode::InvalidName
            }
            PromwareError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            PromwareError::InvalidBuckets(_) => ErrorCode::InvalidBuckets,
            PromwareError::LabelMismatch { .. } => ErrorCode::LabelMismatch,
            PromwareError::NegativeIncrement(_) => ErrorCode::NegativeIncrement,
            PromwareError::Config(_) => ErrorCode::Config,
            PromwareError::Io(_) => ErrorCode::Io,
            PromwareError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<std::io::Error> for PromwareError {
    fn from(e: std::io::Error) -> Self {
        PromwareError::Io(e.to_string())
    }
}
