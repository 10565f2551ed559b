//! The watcher handle consumers pull snapshots from.

use crate::backends::Backend;
use crate::core::reconcile::Reconciler;
use crate::core::{Decoder, Mailbox, Snapshot, WatchOptions, WatcherBuilder};
use crate::error::{Result, VarError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Watches one named variable and hands out the latest snapshot.
///
/// Construction spawns a background task on the current Tokio runtime that
/// queries the backend, waits for change notifications, and publishes
/// snapshots. Consumers call [`pull_next`](Self::pull_next); intermediate values
/// may be skipped, but a consumer never sees a snapshot older than one it has
/// already received.
///
/// Call [`close`](Self::close) to stop the background task deterministically.
/// Dropping an unclosed watcher signals the task to stop without waiting.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar::prelude::*;
/// use runtimevar::backends::MemoryBackend;
///
/// # async fn example() -> Result<()> {
/// let backend = MemoryBackend::new();
/// backend.set("cfg/v1", "hello");
///
/// let watcher = Watcher::builder()
///     .with_name("cfg/v1")
///     .with_backend(backend.clone())
///     .with_decoder(Decoder::string())
///     .build()?;
///
/// let (snapshot, _) = watcher.pull_next(None).await;
/// println!("value: {:?}", snapshot.value());
///
/// watcher.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Watcher<T> {
    name: String,
    mailbox: Arc<Mailbox<T>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Watcher<()> {
    /// Create a new builder for constructing a watcher.
    pub fn builder<T>() -> WatcherBuilder<T> {
        WatcherBuilder::new()
    }
}

impl<T: Send + Sync + 'static> Watcher<T> {
    /// Start watching `name` in `backend`.
    ///
    /// Equivalent to configuring a [`WatcherBuilder`] with the same arguments.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Other`] when called outside a Tokio runtime.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn Backend>,
        decoder: Decoder<T>,
        options: WatchOptions,
    ) -> Result<Self> {
        WatcherBuilder::new()
            .with_name(name)
            .with_shared_backend(backend)
            .with_decoder(decoder)
            .with_options(options)
            .build()
    }

    /// Spawn `reconciler` on the current runtime and wrap it in a handle.
    pub(crate) fn start(reconciler: Reconciler<T>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            VarError::Other(format!("Watcher requires a Tokio runtime: {}", e))
        })?;

        let name = reconciler.name.clone();
        let mailbox = Arc::clone(&reconciler.mailbox);
        let shutdown = CancellationToken::new();
        let task = runtime.spawn(reconciler.run(shutdown.clone()));

        Ok(Self {
            name,
            mailbox,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Wait for the next snapshot.
    ///
    /// Always returns a snapshot: once the watcher is closing, a synthetic
    /// [`VarError::Cancelled`] snapshot. The returned wait duration is always zero
    /// since the background loop paces itself.
    ///
    /// The `previous` hint is accepted for API symmetry; the mailbox already
    /// guarantees only the newest snapshot is delivered.
    pub async fn pull_next(&self, previous: Option<&Snapshot<T>>) -> (Arc<Snapshot<T>>, Duration) {
        self.pull_next_until(previous, &self.shutdown).await
    }

    /// Like [`pull_next`](Self::pull_next), but also gives up when `cancel` fires.
    pub async fn pull_next_until(
        &self,
        _previous: Option<&Snapshot<T>>,
        cancel: &CancellationToken,
    ) -> (Arc<Snapshot<T>>, Duration) {
        let pulled = tokio::select! {
            biased;
            pulled = self.mailbox.pull(cancel) => pulled,
            _ = self.shutdown.cancelled() => None,
        };
        let snapshot =
            pulled.unwrap_or_else(|| Arc::new(Snapshot::from_error(VarError::Cancelled)));
        (snapshot, Duration::ZERO)
    }

    /// Stop the background task and wait until it has exited.
    ///
    /// Calling `close` again after it returned is harmless and returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Other`] if the background task panicked.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.mailbox.drain().await;

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                VarError::Other(format!("Watch loop for {:?} failed: {}", self.name, e))
            })?;
            tracing::debug!(variable = %self.name, "Watcher closed");
        }
        Ok(())
    }
}

impl<T> Watcher<T> {
    /// Name of the watched variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;

    #[tokio::test]
    async fn test_first_pull_and_close() {
        let backend = MemoryBackend::new();
        backend.set("cfg", "hello");

        let watcher = Watcher::new(
            "cfg",
            Arc::new(backend.clone()),
            Decoder::string(),
            WatchOptions::default(),
        )
        .unwrap();
        assert_eq!(watcher.name(), "cfg");

        let (snapshot, wait) = watcher.pull_next(None).await;
        assert_eq!(snapshot.value().unwrap(), "hello");
        assert_eq!(wait, Duration::ZERO);

        watcher.close().await.unwrap();
        assert!(watcher.is_closed());
        watcher.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_after_close_is_cancelled() {
        let watcher = Watcher::new(
            "cfg",
            Arc::new(MemoryBackend::new()),
            Decoder::string(),
            WatchOptions::default(),
        )
        .unwrap();
        watcher.close().await.unwrap();

        let (snapshot, _) = watcher.pull_next(None).await;
        assert!(matches!(snapshot.error(), Some(VarError::Cancelled)));
    }

    #[tokio::test]
    async fn test_close_reports_panicked_loop() {
        let backend = MemoryBackend::new();
        backend.set("cfg", "boom");

        let watcher = Watcher::new(
            "cfg",
            Arc::new(backend),
            Decoder::new(|_: &[u8]| -> std::result::Result<String, _> {
                panic!("decoder panicked")
            }),
            WatchOptions::default(),
        )
        .unwrap();

        let (snapshot, _) = tokio::time::timeout(Duration::from_secs(3), watcher.pull_next(None))
            .await
            .unwrap();
        assert!(matches!(snapshot.error(), Some(VarError::Cancelled)));

        let closed = tokio::time::timeout(Duration::from_secs(3), watcher.close())
            .await
            .unwrap();
        assert!(matches!(closed, Err(VarError::Other(_))));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Watcher::new(
            "cfg",
            Arc::new(MemoryBackend::new()),
            Decoder::string(),
            WatchOptions::default(),
        );
        assert!(matches!(result, Err(VarError::Other(_))));
    }
}
