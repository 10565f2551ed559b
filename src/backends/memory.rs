//! In-process backend with etcd-like revision semantics.

use super::{Backend, ChangeEvent, Entry, QueryResponse, Subscription};
use crate::core::Version;
use crate::error::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Buffered events per subscriber; overflow is dropped since any pending event
/// already triggers a re-query.
const SUBSCRIPTION_BUFFER: usize = 16;

/// Raw response attached to snapshots produced by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResponse {
    /// Store revision at the time of the query.
    pub revision: u64,
    /// Entries returned for the queried name.
    pub entries: Vec<Entry>,
}

#[derive(Default)]
struct Inner {
    revision: u64,
    entries: HashMap<String, Vec<Entry>>,
    subscribers: HashMap<String, Vec<mpsc::Sender<ChangeEvent>>>,
    query_failure: Option<BackendError>,
    subscribe_failure: Option<BackendError>,
}

impl Inner {
    fn next_version(&mut self) -> Version {
        self.revision += 1;
        Version::new(self.revision)
    }

    fn notify(&mut self, name: &str, event: ChangeEvent) {
        if let Some(senders) = self.subscribers.get_mut(name) {
            senders.retain(|tx| match tx.try_send(event) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }
}

/// A revisioned key-value store living in the current process.
///
/// Every write bumps a store-wide revision which becomes the entry's version, the
/// way etcd's modification revision does. Besides normal writes it can inject
/// failures, duplicate entries and dropped subscriptions, which makes it the
/// backend of choice for exercising watchers.
///
/// Cloning yields another handle to the same store.
///
/// # Examples
///
/// ```rust
/// use runtimevar::backends::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// let v1 = backend.set("cfg/v1", "hello");
/// let v2 = backend.set("cfg/v1", "world");
/// assert_ne!(v1, v2);
/// ```
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    queries: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the single entry for `name` and notify subscribers.
    ///
    /// Returns the version assigned to the write.
    pub fn set(&self, name: &str, value: impl Into<Vec<u8>>) -> Version {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        inner
            .entries
            .insert(name.to_string(), vec![Entry::new(value, version)]);
        inner.notify(name, ChangeEvent::Put);
        version
    }

    /// Add another entry under `name` without replacing existing ones.
    ///
    /// Two or more entries make the variable ambiguous.
    pub fn append(&self, name: &str, value: impl Into<Vec<u8>>) -> Version {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        inner
            .entries
            .entry(name.to_string())
            .or_default()
            .push(Entry::new(value, version));
        inner.notify(name, ChangeEvent::Put);
        version
    }

    /// Remove every entry for `name`. Returns `true` if anything was removed.
    pub fn delete(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(name).is_some();
        if removed {
            inner.revision += 1;
            inner.notify(name, ChangeEvent::Delete);
        }
        removed
    }

    /// Send a change event for `name` without changing anything.
    pub fn touch(&self, name: &str) {
        self.inner.lock().notify(name, ChangeEvent::Put);
    }

    /// Make every query fail with `error` until [`clear_failure`](Self::clear_failure).
    pub fn fail_queries(&self, error: BackendError) {
        self.inner.lock().query_failure = Some(error);
    }

    /// Stop failing queries.
    pub fn clear_failure(&self) {
        self.inner.lock().query_failure = None;
    }

    /// Make subscription attempts fail with `error`; `None` restores them.
    pub fn fail_subscriptions(&self, error: Option<BackendError>) {
        self.inner.lock().subscribe_failure = error;
    }

    /// Close every open subscription for `name`, as a backend restart would.
    pub fn drop_subscriptions(&self, name: &str) {
        self.inner.lock().subscribers.remove(name);
    }

    /// Number of subscriptions for `name` whose receiver is still alive.
    pub fn active_subscriptions(&self, name: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(name)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of queries served so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn query(&self, name: &str) -> Result<QueryResponse, BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock();
        if let Some(err) = &inner.query_failure {
            return Err(err.clone());
        }

        let entries = inner.entries.get(name).cloned().unwrap_or_default();
        let raw = MemoryResponse {
            revision: inner.revision,
            entries: entries.clone(),
        };
        Ok(QueryResponse::new(entries).with_raw(raw))
    }

    async fn subscribe(&self, name: &str) -> Result<Subscription, BackendError> {
        let mut inner = self.inner.lock();
        if let Some(err) = &inner.subscribe_failure {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        inner
            .subscribers
            .entry(name.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}
