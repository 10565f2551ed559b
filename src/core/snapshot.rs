//! Immutable observations of a watched variable.

use crate::error::{Result, VarError};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Backend response object attached to a snapshot for advanced inspection.
pub type RawResponse = Arc<dyn Any + Send + Sync>;

/// Backend-assigned token identifying one successful value.
///
/// Versions are opaque: they can be compared for equality but have no ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(u64);

impl Version {
    /// Wrap a backend version token.
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// The raw token.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Version {
    fn from(token: u64) -> Self {
        Self(token)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum State<T> {
    Value {
        value: T,
        update_time: DateTime<Utc>,
        version: Version,
    },
    Error(VarError),
}

/// One observation of the watched variable: either a decoded value or an error.
///
/// Snapshots are never mutated once built; the watcher hands them out as
/// `Arc<Snapshot<T>>`.
///
/// # Examples
///
/// ```rust
/// use runtimevar::core::{Snapshot, Version};
///
/// let snapshot = Snapshot::new("hello".to_string(), Version::new(1), None);
/// assert_eq!(snapshot.value().unwrap(), "hello");
/// assert_eq!(snapshot.version(), Some(Version::new(1)));
/// assert!(snapshot.raw_as::<String>().is_none());
/// ```
pub struct Snapshot<T> {
    state: State<T>,
    raw: Option<RawResponse>,
}

impl<T> Snapshot<T> {
    /// Build a value snapshot stamped with the current wall-clock time.
    pub fn new(value: T, version: Version, raw: Option<RawResponse>) -> Self {
        Self {
            state: State::Value {
                value,
                update_time: Utc::now(),
                version,
            },
            raw,
        }
    }

    /// Build an error snapshot.
    pub fn from_error(error: VarError) -> Self {
        Self {
            state: State::Error(error),
            raw: None,
        }
    }

    /// The decoded value, or the error this snapshot carries.
    pub fn value(&self) -> std::result::Result<&T, &VarError> {
        match &self.state {
            State::Value { value, .. } => Ok(value),
            State::Error(err) => Err(err),
        }
    }

    /// Consume the snapshot, returning the value or its error.
    pub fn into_value(self) -> Result<T> {
        match self.state {
            State::Value { value, .. } => Ok(value),
            State::Error(err) => Err(err),
        }
    }

    /// The error, if this snapshot carries one.
    pub fn error(&self) -> Option<&VarError> {
        match &self.state {
            State::Value { .. } => None,
            State::Error(err) => Some(err),
        }
    }

    /// Returns `true` if this snapshot carries a value.
    pub fn is_ok(&self) -> bool {
        self.error().is_none()
    }

    /// Time of the last successful value change; `None` on error snapshots.
    pub fn update_time(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            State::Value { update_time, .. } => Some(*update_time),
            State::Error(_) => None,
        }
    }

    /// Version of the value; `None` on error snapshots.
    pub fn version(&self) -> Option<Version> {
        match &self.state {
            State::Value { version, .. } => Some(*version),
            State::Error(_) => None,
        }
    }

    /// Borrow the backend's raw response as `R`.
    ///
    /// Returns `None` when no raw response is attached (always the case for
    /// error snapshots) or when it is not an `R`.
    pub fn raw_as<R: Any>(&self) -> Option<&R> {
        self.raw.as_deref()?.downcast_ref::<R>()
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Snapshot");
        match &self.state {
            State::Value {
                value,
                update_time,
                version,
            } => out
                .field("value", value)
                .field("update_time", update_time)
                .field("version", version),
            State::Error(err) => out.field("error", err),
        };
        out.field("has_raw", &self.raw.is_some()).finish()
    }
}
