//! # Errors
//!
//! TAP servers answer every request with a status code, so failures are
//! structured values rather than strings:
//! - a fixed set of kinds, each with a status code and a class name
//! - carried through `anyhow::Error` so handlers can use `?` freely
//! - converted to a response envelope only at the dispatch boundary
//!
//! Clients never see `source`; it is kept for logs.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::Value;

/// A convenience result type for TAP APIs.
pub type TapResult<T> = std::result::Result<T, AnyError>;

/// Message returned for every unresolved path or unknown entity.
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// Message returned for every unsupported verb.
pub const NOT_ALLOWED_MESSAGE: &str = "Request not allowed";

/// Error classes a resource server can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotFound,         // 404
    MethodNotAllowed, // 405
    Conflict,         // 409
    Unprocessable,    // 422
    GeneralError,     // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Kebab-cased class name, used as the `error.class` log field.
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// A structured TAP error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct TapError {
    pub kind: ErrorKind,
    pub message: String,
    /// Per-field messages, e.g. `{"name": ["is required"]}`.
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl TapError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            source: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through `?`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Downcast an `anyhow::Error` to a `TapError` if possible.
    pub fn from_anyhow(err: &AnyError) -> Option<&TapError> {
        err.downcast_ref::<TapError>()
    }

    /// Turn any error into a TapError:
    /// - if it's already a TapError, keep it
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> TapError {
        match err.downcast::<TapError>() {
            Ok(tap) => tap,
            Err(other) => TapError::new(ErrorKind::GeneralError, other.to_string()).with_source(other),
        }
    }

    /// Copy without the inner `source`, suitable for returning to callers.
    pub fn sanitize_for_client(&self) -> TapError {
        TapError {
            kind: self.kind,
            message: self.message.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }

    /// Not-found errors always carry the fixed client message; `detail`
    /// survives only as the source.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, NOT_FOUND_MESSAGE).with_source(AnyError::msg(detail.into()))
    }

    pub fn method_not_allowed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, NOT_ALLOWED_MESSAGE)
            .with_source(AnyError::msg(detail.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
}

impl fmt::Display for TapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)?;
        if let Some(source) = &self.source {
            write!(f, " [{source}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for TapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for "bail with TapError".
#[macro_export]
macro_rules! bail_tap {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::TapError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::TapError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}
