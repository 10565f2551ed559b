//! Deciding when two errors are "the same" for duplicate suppression.

use crate::error::VarError;

/// Returns `true` iff `a` and `b` represent an equivalent error, i.e. one that
/// should not be reported to consumers as a new transition.
///
/// Two errors are equivalent when their messages match, or when both are backend
/// failures carrying the same non-`Ok` status code.
///
/// # Examples
///
/// ```rust
/// use runtimevar::core::equivalent_error;
/// use runtimevar::error::{BackendError, Code, VarError};
///
/// let a = VarError::from(BackendError::new(Code::Unavailable, "connection reset"));
/// let b = VarError::from(BackendError::new(Code::Unavailable, "connection refused"));
/// assert!(equivalent_error(&a, &b));
/// assert!(!equivalent_error(&a, &VarError::NotExist));
/// ```
pub fn equivalent_error(a: &VarError, b: &VarError) -> bool {
    if a.to_string() == b.to_string() {
        return true;
    }
    match (a.backend(), b.backend()) {
        (Some(a), Some(b)) => !a.code().is_ok() && a.code() == b.code(),
        _ => false,
    }
}
