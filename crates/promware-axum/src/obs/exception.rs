//! Exception tracking: a global unlabeled counter plus a detailed counter
//! labeled by error type, originating module, and status code.

use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::Location;

use super::{record, ApiMetrics};

const POINTERS: [&str; 3] = ["Box", "Arc", "Rc"];

/// Label-friendly name of `T`.
///
/// `my_app::errors::ZeroDivisionError` -> `ZeroDivisionError`. Smart
/// pointers are looked through (`Box<io::Error>` -> `Error`), and trait
/// objects name their trait without auto-trait bounds, so `BoxError` and
/// `dyn Error + Send + Sync` both become `dyn Error`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    short_name(std::any::type_name::<T>())
}

fn short_name(full: &'static str) -> &'static str {
    let mut name = full.trim();
    loop {
        name = name.trim_start_matches('&');
        name = name.strip_prefix("mut ").unwrap_or(name);
        let Some((head, inner)) = name.split_once('<') else {
            break;
        };
        if !POINTERS.contains(&last_segment(head)) {
            break;
        }
        name = inner.strip_suffix('>').unwrap_or(inner).trim();
    }

    if let Some(object) = name.strip_prefix("dyn ") {
        let principal = object.split(" + ").next().unwrap_or(object);
        return match last_segment(principal) {
            "Error" => "dyn Error",
            other => other,
        };
    }
    last_segment(name)
}

fn last_segment(path: &'static str) -> &'static str {
    let base = path.split('<').next().unwrap_or(path);
    base.rsplit("::").next().unwrap_or(base)
}

/// Best-effort module path from a source location.
///
/// `crates/app/src/handlers/chat.rs` -> `handlers::chat`. Files outside a
/// `src/` tree map to their stem; an empty result becomes `"unknown"`.
pub fn module_from_location(loc: &Location<'_>) -> String {
    module_from_path(loc.file())
}

fn module_from_path(file: &str) -> String {
    let file = file.replace('\\', "/");
    let rel = match file.rfind("/src/") {
        Some(i) => &file[i + 5..],
        None => match file.strip_prefix("src/") {
            Some(rest) => rest,
            None => file.rsplit('/').next().unwrap_or(""),
        },
    };
    let rel = rel.strip_suffix(".rs").unwrap_or(rel);
    let rel = rel.strip_suffix("/mod").unwrap_or(rel);
    match rel {
        "" => "unknown".to_string(),
        "lib" | "main" => "crate".to_string(),
        other => other.replace('/', "::"),
    }
}

impl ApiMetrics {
    /// Count an exception without any detail.
    pub fn track_global_exception(&self) {
        record("global_exception", self.global_exceptions.inc(&[]));
    }

    /// Count and log an error, attributing it to the caller's module.
    #[track_caller]
    pub fn track_detailed_exception<E: Error + ?Sized>(&self, error: &E, status_code: Option<u16>) {
        let module = module_from_location(Location::caller());
        self.record_exception(short_type_name::<E>(), &module, status_code, &error.to_string());
    }

    /// Shared path for errors whose type/module were captured elsewhere
    /// (handler failures, panics).
    pub fn record_exception(&self, exception_type: &str, module: &str, status_code: Option<u16>, message: &str) {
        let code = status_code.map_or_else(|| "0".to_string(), |c| c.to_string());
        record(
            "detailed_exception",
            self.exceptions.inc(&[
                ("exception_type", exception_type),
                ("module", module),
                ("code", code.as_str()),
            ]),
        );
        tracing::error!(
            exception_type,
            module,
            status_code = ?status_code,
            backtrace = %Backtrace::capture(),
            "exception: {exception_type}: {message}"
        );
    }
}
