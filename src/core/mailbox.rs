//! Single-slot, overwrite-on-push mailbox between the watch loop and consumers.

use crate::core::Snapshot;
use crate::error::VarError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct Slot<T> {
    latest: Option<Arc<Snapshot<T>>>,
    closed: bool,
}

/// Coalescing hand-off holding at most one unread snapshot.
///
/// The background loop is the only producer. `push` never blocks: it replaces
/// whatever is unread, so a slow consumer only ever sees the newest snapshot and
/// can never stall the loop.
///
/// # Examples
///
/// ```rust
/// use runtimevar::core::{Mailbox, Snapshot, Version};
/// use std::sync::Arc;
///
/// let mailbox = Mailbox::new();
/// mailbox.push(Arc::new(Snapshot::new(1, Version::new(1), None)));
/// mailbox.push(Arc::new(Snapshot::new(2, Version::new(2), None)));
///
/// let latest = mailbox.try_take().unwrap();
/// assert_eq!(*latest.value().unwrap(), 2);
/// assert!(mailbox.try_take().is_none());
/// ```
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    ready: Notify,
}

impl<T> Mailbox<T> {
    /// Create an empty, open mailbox.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                closed: false,
            }),
            ready: Notify::new(),
        }
    }

    /// Store `snapshot`, discarding any unread one.
    ///
    /// Pushes after [`close`](Self::close) are dropped.
    pub fn push(&self, snapshot: Arc<Snapshot<T>>) {
        {
            let mut slot = self.slot.lock();
            if slot.closed {
                tracing::trace!("Dropping snapshot pushed after close");
                return;
            }
            if slot.latest.replace(snapshot).is_some() {
                tracing::trace!("Discarded unread snapshot");
            }
        }
        self.ready.notify_one();
    }

    /// Take the unread snapshot without waiting.
    pub fn try_take(&self) -> Option<Arc<Snapshot<T>>> {
        self.slot.lock().latest.take()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the mailbox is closed and fully drained.
    pub async fn recv(&self) -> Option<Arc<Snapshot<T>>> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            // Register before checking the slot so a push or close racing with
            // the check still wakes us.
            notified.as_mut().enable();
            {
                let mut slot = self.slot.lock();
                if let Some(snapshot) = slot.latest.take() {
                    return Some(snapshot);
                }
                if slot.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Wait for the next snapshot or for `cancel` to fire.
    ///
    /// On cancellation a synthetic [`VarError::Cancelled`] snapshot is returned.
    /// Returns `None` once the mailbox is closed and fully drained.
    pub async fn pull(&self, cancel: &CancellationToken) -> Option<Arc<Snapshot<T>>> {
        tokio::select! {
            biased;
            pulled = self.recv() => pulled,
            _ = cancel.cancelled() => Some(Arc::new(Snapshot::from_error(VarError::Cancelled))),
        }
    }

    /// Mark the mailbox closed and wake every waiter.
    ///
    /// An unread snapshot stays available until taken.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.ready.notify_waiters();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Discard snapshots until the mailbox reports closure.
    pub async fn drain(&self) {
        while self.recv().await.is_some() {}
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Version;
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn value(v: u64) -> Arc<Snapshot<u64>> {
        Arc::new(Snapshot::new(v, Version::new(v), None))
    }

    #[tokio::test]
    async fn test_push_overwrites_unread() {
        let mailbox = Mailbox::new();
        mailbox.push(value(1));
        mailbox.push(value(2));

        let got = mailbox.recv().await.unwrap();
        assert_eq!(*got.value().unwrap(), 2);
        assert!(mailbox.try_take().is_none());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = Arc::clone(&mailbox);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push(value(5));
        });

        let got = timeout(Duration::from_secs(2), mailbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.version(), Some(Version::new(5)));
    }

    #[tokio::test]
    async fn test_pull_returns_cancelled_snapshot() {
        let mailbox: Mailbox<u64> = Mailbox::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let got = mailbox.pull(&cancel).await.unwrap();
        assert!(matches!(got.error(), Some(VarError::Cancelled)));
    }

    #[tokio::test]
    async fn test_pull_prefers_available_snapshot_over_cancel() {
        let mailbox = Mailbox::new();
        mailbox.push(value(3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let got = mailbox.pull(&cancel).await.unwrap();
        assert_eq!(*got.value().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_close_keeps_unread_snapshot_drainable() {
        let mailbox = Mailbox::new();
        mailbox.push(value(9));
        mailbox.close();

        assert!(mailbox.is_closed());
        assert_eq!(*mailbox.recv().await.unwrap().value().unwrap(), 9);
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_push_after_close_is_dropped() {
        let mailbox = Mailbox::new();
        mailbox.close();
        mailbox.push(value(1));
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_receiver() {
        let mailbox: Arc<Mailbox<u64>> = Arc::new(Mailbox::new());
        let closer = Arc::clone(&mailbox);

        let waiter = tokio::spawn(async move { mailbox.recv().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();

        assert!(timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_drain_on_closed_mailbox_returns_immediately() {
        let mailbox: Mailbox<u64> = Mailbox::new();
        mailbox.close();
        timeout(Duration::from_millis(100), mailbox.drain())
            .await
            .unwrap();
        // A second drain must not block either.
        timeout(Duration::from_millis(100), mailbox.drain())
            .await
            .unwrap();
    }

    proptest! {
        #[test]
        fn prop_last_push_wins(pushes in proptest::collection::vec(0u64..1000, 1..20)) {
            let mailbox = Mailbox::new();
            for v in &pushes {
                mailbox.push(value(*v));
            }
            let got = mailbox.try_take().unwrap();
            prop_assert_eq!(*got.value().unwrap(), *pushes.last().unwrap());
            prop_assert!(mailbox.try_take().is_none());
        }
    }
}
