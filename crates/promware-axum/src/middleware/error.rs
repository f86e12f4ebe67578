//! Handler failures and the JSON error body.
//!
//! Handlers report failure by returning `HandlerError` (usually through `?`).
//! Its response carries a `HandlerFailure` extension so the middleware can
//! tell a failed handler apart from an ordinary 4xx/5xx response.

use std::any::Any;
use std::error::Error;
use std::panic::Location;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::obs::{module_from_location, short_type_name};

/// What the middleware needs to record and answer a handler failure.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub status: Option<StatusCode>,
    pub error_type: Arc<str>,
    pub module: Arc<str>,
    pub message: Arc<str>,
}

impl HandlerFailure {
    /// Status carried by the error, defaulting to 500.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self {
            status: None,
            error_type: Arc::from("panic"),
            module: Arc::from("unknown"),
            message: Arc::from(message),
        }
    }
}

/// Error returned from an instrumented handler.
#[derive(Debug, Clone)]
pub struct HandlerError {
    failure: HandlerFailure,
}

impl HandlerError {
    /// Wrap any error. Type and module are taken from `E` and the caller.
    #[track_caller]
    pub fn new<E: Error + ?Sized>(error: &E) -> Self {
        Self::from_parts(short_type_name::<E>(), error.to_string(), Location::caller())
    }

    /// Error built from a bare message (type label `HandlerError`).
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from_parts("HandlerError", message.into(), Location::caller())
    }

    fn from_parts(error_type: &str, message: String, loc: &Location<'_>) -> Self {
        Self {
            failure: HandlerFailure {
                status: None,
                error_type: Arc::from(error_type),
                module: Arc::from(module_from_location(loc)),
                message: Arc::from(message),
            },
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.failure.status = Some(status);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.failure.status()
    }

    pub fn error_type(&self) -> &str {
        &self.failure.error_type
    }

    pub fn module(&self) -> &str {
        &self.failure.module
    }

    pub fn message(&self) -> &str {
        &self.failure.message
    }
}

impl<E: Error + Send + Sync + 'static> From<E> for HandlerError {
    #[track_caller]
    fn from(error: E) -> Self {
        HandlerError::new(&error)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.failure.status();
        let mut resp = error_response(status, vec![self.failure.message.to_string()]);
        resp.extensions_mut().insert(self.failure);
        resp
    }
}

/// `{"errors": [...], "success": false}` with the given status.
pub fn error_response(status: StatusCode, errors: Vec<String>) -> Response {
    (status, Json(json!({ "errors": errors, "success": false }))).into_response()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[derive(Debug)]
    struct NotFound;

    impl std::fmt::Display for NotFound {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("item not found")
        }
    }

    impl Error for NotFound {}

    fn lookup() -> Result<(), HandlerError> {
        Err(NotFound)?;
        Ok(())
    }

    #[test]
    fn question_mark_captures_type_module_and_message() {
        let err = lookup().unwrap_err();
        assert_eq!(err.error_type(), "NotFound");
        assert_eq!(err.module(), "middleware::error");
        assert_eq!(err.message(), "item not found");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn boxed_errors_are_labeled_by_trait_not_pointer() {
        let boxed: axum::BoxError = Box::new(NotFound);
        let err = HandlerError::new(&*boxed);
        assert_eq!(err.error_type(), "dyn Error");
        assert_eq!(err.message(), "item not found");
    }

    #[test]
    fn response_is_marked_with_failure() {
        let resp = HandlerError::new(&NotFound)
            .with_status(StatusCode::NOT_FOUND)
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let failure = resp.extensions().get::<HandlerFailure>().unwrap();
        assert_eq!(&*failure.error_type, "NotFound");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let f = HandlerFailure::from_panic(&"boom");
        assert_eq!(&*f.message, "boom");
        let f = HandlerFailure::from_panic(&String::from("owned boom"));
        assert_eq!(&*f.message, "owned boom");
        assert_eq!(f.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
