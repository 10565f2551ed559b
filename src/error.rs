//! Error types for runtimevar.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Result type alias for runtimevar operations.
pub type Result<T> = std::result::Result<T, VarError>;

/// Errors carried by snapshots and returned by watcher operations.
///
/// `VarError` is `Clone` so that an error snapshot can be shared between the
/// background loop and every consumer that pulls it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VarError {
    /// The backend has no entry for the variable.
    #[error("variable does not exist")]
    NotExist,

    /// The backend returned more than one entry for the variable.
    #[error("{name:?} has multiple values ({count} entries)")]
    Ambiguous {
        /// Name of the watched variable
        name: String,
        /// Number of entries the backend returned
        count: usize,
    },

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The raw bytes could not be decoded into the typed value.
    #[error("Failed to decode variable: {0}")]
    Decode(String),

    /// The watch was cancelled or the watcher was closed.
    #[error("watch cancelled")]
    Cancelled,

    /// Invalid or unloadable watcher configuration.
    #[error("Invalid watcher configuration: {0}")]
    Config(String),

    /// Generic error for other cases.
    #[error("Watcher error: {0}")]
    Other(String),
}

impl VarError {
    /// Returns `true` if this is the "variable does not exist" sentinel.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use runtimevar::error::VarError;
    ///
    /// assert!(VarError::NotExist.is_not_exist());
    /// assert!(!VarError::Cancelled.is_not_exist());
    /// ```
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist)
    }

    /// Returns the backend failure, if this error came from the backend.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }

    /// Extract the backend-specific error detail as a concrete type.
    ///
    /// Returns `None` if this is not a backend error, if the backend attached no
    /// detail, or if the detail is of a different type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use runtimevar::error::{BackendError, Code, VarError};
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    /// let err = VarError::from(BackendError::new(Code::PermissionDenied, "read failed").with_source(io));
    ///
    /// let detail = err.error_as::<std::io::Error>().unwrap();
    /// assert_eq!(detail.kind(), std::io::ErrorKind::PermissionDenied);
    /// assert!(VarError::NotExist.error_as::<std::io::Error>().is_none());
    /// ```
    pub fn error_as<E: StdError + 'static>(&self) -> Option<&E> {
        self.backend().and_then(|err| err.downcast_ref::<E>())
    }
}

/// Status code attached to backend failures.
///
/// Mirrors the gRPC status code set so that backends speaking different
/// protocols can report comparable failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// Not an error.
    Ok,
    /// The operation was cancelled.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// The request was malformed.
    InvalidArgument,
    /// The deadline expired before the operation completed.
    DeadlineExceeded,
    /// The requested entity was not found.
    NotFound,
    /// The entity already exists.
    AlreadyExists,
    /// The caller lacks permission.
    PermissionDenied,
    /// A quota or resource limit was hit.
    ResourceExhausted,
    /// The system is not in a state required for the operation.
    FailedPrecondition,
    /// The operation was aborted.
    Aborted,
    /// The operation was attempted past the valid range.
    OutOfRange,
    /// The operation is not implemented or supported.
    Unimplemented,
    /// Internal backend error.
    Internal,
    /// The backend is currently unavailable.
    Unavailable,
    /// Unrecoverable data loss or corruption.
    DataLoss,
    /// The request lacks valid authentication credentials.
    Unauthenticated,
}

impl Code {
    /// Returns `true` for [`Code::Ok`].
    pub fn is_ok(self) -> bool {
        self == Code::Ok
    }

    /// Map an HTTP status code to the closest status code.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use runtimevar::error::Code;
    ///
    /// assert_eq!(Code::from_http_status(404), Code::NotFound);
    /// assert_eq!(Code::from_http_status(503), Code::Unavailable);
    /// ```
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => Code::Ok,
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            408 | 504 => Code::DeadlineExceeded,
            409 => Code::Aborted,
            412 => Code::FailedPrecondition,
            429 => Code::ResourceExhausted,
            499 => Code::Cancelled,
            501 => Code::Unimplemented,
            502 | 503 => Code::Unavailable,
            500..=599 => Code::Internal,
            _ => Code::Unknown,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid argument",
            Code::DeadlineExceeded => "deadline exceeded",
            Code::NotFound => "not found",
            Code::AlreadyExists => "already exists",
            Code::PermissionDenied => "permission denied",
            Code::ResourceExhausted => "resource exhausted",
            Code::FailedPrecondition => "failed precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out of range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a backend.
///
/// Carries a status [`Code`], a message, and optionally the backend's own error
/// value, which callers can recover with [`VarError::error_as`].
#[derive(Clone)]
pub struct BackendError {
    code: Code,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl BackendError {
    /// Create a backend error with a status code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the backend-specific error value.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Error for a backend call that did not finish within `timeout`.
    pub fn deadline_exceeded(timeout: std::time::Duration) -> Self {
        Self::new(
            Code::DeadlineExceeded,
            format!("backend call did not complete within {:?}", timeout),
        )
    }

    /// The status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Downcast the attached backend-specific error.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref()?.downcast_ref::<E>()
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}
