//! Error envelope types and helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, io};

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Metadata attached to errors for diagnostics.
pub type ErrorMetadata = BTreeMap<String, String>;

/// High-level classification of error origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Expected failures (validation, user input, misconfiguration).
    Expected,
    /// Invariant violations in measurement or backend logic.
    Invariant,
    /// Unexpected failures (I/O, environment).
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected => formatter.write_str("expected"),
            Self::Invariant => formatter.write_str("invariant"),
            Self::Unexpected => formatter.write_str("unexpected"),
        }
    }
}

/// Retry classification for failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// The operation can be retried safely.
    Retriable,
    /// The operation should not be retried.
    NonRetriable,
}

impl ErrorClass {
    /// Returns true when the error is considered retriable.
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retriable => formatter.write_str("retriable"),
            Self::NonRetriable => formatter.write_str("non-retriable"),
        }
    }
}

/// Stable error code with namespace and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    namespace: String,
    code: String,
}

impl ErrorCode {
    /// Create a new error code with a namespace and code.
    pub fn new(namespace: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code: code.into(),
        }
    }

    /// Invalid input code.
    pub fn invalid_input() -> Self {
        Self::new("core", "invalid_input")
    }

    /// Not found code.
    pub fn not_found() -> Self {
        Self::new("core", "not_found")
    }

    /// Permission denied code.
    pub fn permission_denied() -> Self {
        Self::new("core", "permission_denied")
    }

    /// Timeout code.
    pub fn timeout() -> Self {
        Self::new("core", "timeout")
    }

    /// I/O error code.
    pub fn io() -> Self {
        Self::new("core", "io")
    }

    /// Internal failure code.
    pub fn internal() -> Self {
        Self::new("core", "internal")
    }

    /// Returns the namespace portion.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the code identifier.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.code)
    }
}

/// Structured error envelope shared across crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error kind describing the origin category.
    pub kind: ErrorKind,
    /// Retry classification.
    pub class: ErrorClass,
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Additional diagnostic metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ErrorMetadata,
}

impl ErrorEnvelope {
    /// Create an expected error with non-retriable classification.
    pub fn expected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Expected,
            class: ErrorClass::NonRetriable,
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create an invariant error (always non-retriable).
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Invariant,
            class: ErrorClass::NonRetriable,
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create an unexpected error with the provided retry classification.
    pub fn unexpected(code: ErrorCode, message: impl Into<String>, class: ErrorClass) -> Self {
        Self {
            kind: ErrorKind::Unexpected,
            class,
            code,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a single metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true when the error reports a broken internal contract.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self.kind, ErrorKind::Invariant)
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} {}: {}",
            self.kind, self.class, self.code, self.message
        )
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<io::Error> for ErrorEnvelope {
    fn from(error: io::Error) -> Self {
        let kind = error.kind();
        let class = if is_retriable_io(kind) {
            ErrorClass::Retriable
        } else {
            ErrorClass::NonRetriable
        };
        Self::unexpected(error_code_from_io_kind(kind), error.to_string(), class)
    }
}

fn error_code_from_io_kind(kind: io::ErrorKind) -> ErrorCode {
    match kind {
        io::ErrorKind::NotFound => ErrorCode::not_found(),
        io::ErrorKind::PermissionDenied => ErrorCode::permission_denied(),
        io::ErrorKind::TimedOut => ErrorCode::timeout(),
        _ => ErrorCode::io(),
    }
}

const fn is_retriable_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::BrokenPipe
    )
}
