//! Backend trait consumed by the watch loop.

use crate::core::{RawResponse, Version};
use crate::error::{BackendError, Code};
use async_trait::async_trait;
use std::any::Any;
use tokio::sync::mpsc;

/// One stored value for a variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Raw stored bytes, handed to the decoder.
    pub value: Vec<u8>,
    /// Backend-assigned version of this value.
    pub version: Version,
}

impl Entry {
    /// Create an entry.
    pub fn new(value: impl Into<Vec<u8>>, version: Version) -> Self {
        Self {
            value: value.into(),
            version,
        }
    }
}

/// Result of a point query.
pub struct QueryResponse {
    /// Entries stored under the queried name, in backend order.
    pub entries: Vec<Entry>,
    /// The backend's own response object, exposed through `Snapshot::raw_as`.
    pub raw: Option<RawResponse>,
}

impl QueryResponse {
    /// A response with no raw object attached.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries, raw: None }
    }

    /// Attach the backend's raw response.
    pub fn with_raw<R: Any + Send + Sync>(mut self, raw: R) -> Self {
        self.raw = Some(std::sync::Arc::new(raw));
        self
    }
}

/// Kind of change a backend reports.
///
/// Events are hints only: the loop always re-queries, so a spurious event costs
/// one query and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The value was written.
    Put,
    /// The value was removed.
    Delete,
}

/// Stream of change events for one variable.
///
/// The backend may end the stream at any time; the loop then re-subscribes on
/// its next cycle.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    /// Wrap a channel of change events.
    pub fn new(events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self {
            events,
            _guard: None,
        }
    }

    /// Wrap a channel of change events together with a value that must stay
    /// alive for as long as the subscription (e.g. an OS file watcher).
    pub fn with_guard<G: Any + Send>(events: mpsc::Receiver<ChangeEvent>, guard: G) -> Self {
        Self {
            events,
            _guard: Some(Box::new(guard)),
        }
    }

    /// Wait for the next event; `None` once the backend has closed the stream.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

/// A store holding named variables.
///
/// Implement this trait to watch variables in a custom store (e.g. etcd,
/// Consul, a database table).
///
/// The watch loop bounds every call with its own timeout, so implementations do
/// not need to enforce one.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch every entry currently stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or status failures. An absent variable is
    /// not an error: return an empty entry list.
    async fn query(&self, name: &str) -> Result<QueryResponse, BackendError>;

    /// Open a change-notification stream for `name`.
    ///
    /// The default implementation reports [`Code::Unimplemented`], which makes
    /// the loop fall back to polling.
    async fn subscribe(&self, name: &str) -> Result<Subscription, BackendError> {
        let _ = name;
        Err(BackendError::new(
            Code::Unimplemented,
            format!("{} does not support change notifications", self.name()),
        ))
    }

    /// Get a human-readable name for this backend (for logging/debugging).
    fn name(&self) -> String;
}
