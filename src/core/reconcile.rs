//! Background reconciliation loop feeding a watcher's mailbox.

use crate::backends::{Backend, Subscription};
use crate::core::{Decoder, Mailbox, Snapshot, equivalent_error};
use crate::error::{BackendError, VarError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Subscription state of the loop.
pub(crate) enum LoopState {
    NoSubscription,
    Subscribed(Subscription),
    Stopped,
}

/// Closes the mailbox when dropped, so consumers and `Watcher::close` are
/// released even if the loop unwinds from a panicking decoder or backend.
struct CloseOnDrop<T>(Arc<Mailbox<T>>);

impl<T> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Owns everything the background task needs; nothing here is shared with
/// consumers except the mailbox.
pub(crate) struct Reconciler<T> {
    pub(crate) name: String,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) decoder: Decoder<T>,
    pub(crate) timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) mailbox: Arc<Mailbox<T>>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<WatchMetrics>,
}

impl<T: Send + Sync + 'static> Reconciler<T> {
    /// Run until `cancel` fires, then close the mailbox.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let _close = CloseOnDrop(Arc::clone(&self.mailbox));
        tracing::debug!(
            variable = %self.name,
            backend = %self.backend.name(),
            timeout = ?self.timeout,
            "Watch loop started"
        );

        let mut state = LoopState::NoSubscription;
        let mut cur: Option<Arc<Snapshot<T>>> = None;

        loop {
            if let LoopState::NoSubscription = state {
                state = self.subscribe().await;
            }

            if let Some(next) = self.observe(cur.as_deref()).await {
                cur = Some(self.update_state(next, cur.as_deref()));
            }

            state = self.wait(state, &cancel).await;
            if let LoopState::Stopped = state {
                break;
            }
        }

        tracing::debug!(variable = %self.name, "Watch loop exited");
    }

    /// Best-effort subscription; failure degrades to polling.
    async fn subscribe(&self) -> LoopState {
        match timeout(self.timeout, self.backend.subscribe(&self.name)).await {
            Ok(Ok(subscription)) => {
                tracing::debug!(variable = %self.name, "Subscribed to change notifications");
                LoopState::Subscribed(subscription)
            }
            Ok(Err(e)) => {
                tracing::debug!(
                    variable = %self.name,
                    error = %e,
                    "Change notifications unavailable, polling"
                );
                LoopState::NoSubscription
            }
            Err(_) => {
                tracing::debug!(
                    variable = %self.name,
                    timeout = ?self.timeout,
                    "Subscription attempt timed out, polling"
                );
                LoopState::NoSubscription
            }
        }
    }

    /// Query the backend and build the next snapshot.
    ///
    /// Returns `None` when the value is unchanged since the last good snapshot,
    /// in which case nothing is decoded or published.
    async fn observe(&self, prev: Option<&Snapshot<T>>) -> Option<Snapshot<T>> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_query());

        let result = match timeout(self.timeout, self.backend.query(&self.name)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::deadline_exceeded(self.timeout)),
        };

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            match &result {
                Ok(_) => metrics.record_query_success(timer),
                Err(_) => metrics.record_query_failure(timer),
            }
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(variable = %self.name, error = %e, "Backend query failed");
                return Some(Snapshot::from_error(e.into()));
            }
        };

        let entry = match response.entries.as_slice() {
            [] => return Some(Snapshot::from_error(VarError::NotExist)),
            [entry] => entry,
            entries => {
                return Some(Snapshot::from_error(VarError::Ambiguous {
                    name: self.name.clone(),
                    count: entries.len(),
                }));
            }
        };

        if let Some(prev) = prev {
            if prev.is_ok() && prev.version() == Some(entry.version) {
                tracing::trace!(variable = %self.name, version = %entry.version, "Value unchanged");
                return None;
            }
        }

        let decoded = self.decoder.decode(&entry.value);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_decode(decoded.is_err());
        }

        Some(match decoded {
            Ok(value) => Snapshot::new(value, entry.version, response.raw.clone()),
            Err(e) => {
                tracing::warn!(variable = %self.name, error = %e, "Failed to decode value");
                Snapshot::from_error(e)
            }
        })
    }

    /// Push `next` unless it repeats the error in `prev`; either way `next`
    /// becomes the new current snapshot.
    fn update_state(&self, next: Snapshot<T>, prev: Option<&Snapshot<T>>) -> Arc<Snapshot<T>> {
        let next = Arc::new(next);

        if let (Some(err), Some(prev_err)) = (next.error(), prev.and_then(Snapshot::error)) {
            if equivalent_error(err, prev_err) {
                tracing::debug!(variable = %self.name, error = %err, "Suppressing repeated error");
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_suppressed();
                }
                return next;
            }
        }

        tracing::trace!(
            variable = %self.name,
            ok = next.is_ok(),
            version = ?next.version(),
            "Publishing snapshot"
        );
        self.mailbox.push(Arc::clone(&next));
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_published();
        }
        next
    }

    /// Block until the next cycle should start or the loop is cancelled.
    async fn wait(&self, state: LoopState, cancel: &CancellationToken) -> LoopState {
        match state {
            LoopState::Subscribed(mut subscription) => {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return LoopState::Stopped,
                    event = subscription.next() => event,
                };
                match event {
                    Some(event) => {
                        tracing::trace!(variable = %self.name, ?event, "Change notification");
                        LoopState::Subscribed(subscription)
                    }
                    None => {
                        tracing::debug!(
                            variable = %self.name,
                            "Subscription closed by backend, re-subscribing"
                        );
                        LoopState::NoSubscription
                    }
                }
            }
            LoopState::NoSubscription => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => LoopState::Stopped,
                    _ = tokio::time::sleep(self.poll_interval) => LoopState::NoSubscription,
                }
            }
            LoopState::Stopped => LoopState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::core::Version;
    use crate::error::{BackendError, Code};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reconciler(backend: &MemoryBackend, decodes: Arc<AtomicUsize>) -> Reconciler<String> {
        Reconciler {
            name: "cfg".to_string(),
            backend: Arc::new(backend.clone()),
            decoder: Decoder::new(move |bytes: &[u8]| {
                decodes.fetch_add(1, Ordering::SeqCst);
                Ok(String::from_utf8(bytes.to_vec())?)
            }),
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(20),
            mailbox: Arc::new(Mailbox::new()),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[tokio::test]
    async fn test_observe_missing_is_not_exist() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());

        let snapshot = r.observe(None).await.unwrap();
        assert!(snapshot.error().unwrap().is_not_exist());
    }

    #[tokio::test]
    async fn test_observe_skips_unchanged_version() {
        let backend = MemoryBackend::new();
        let decodes = Arc::new(AtomicUsize::new(0));
        let r = reconciler(&backend, Arc::clone(&decodes));
        backend.set("cfg", "hello");

        let first = r.observe(None).await.unwrap();
        assert_eq!(first.value().unwrap(), "hello");
        assert!(r.observe(Some(&first)).await.is_none());
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observe_decodes_again_after_error() {
        let backend = MemoryBackend::new();
        let decodes = Arc::new(AtomicUsize::new(0));
        let r = reconciler(&backend, Arc::clone(&decodes));
        backend.set("cfg", "hello");

        let prev = Snapshot::from_error(VarError::NotExist);
        let next = r.observe(Some(&prev)).await.unwrap();
        assert!(next.is_ok());
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observe_decode_failure() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        backend.set("cfg", vec![0xff, 0xfe]);

        let snapshot = r.observe(None).await.unwrap();
        assert!(matches!(snapshot.error(), Some(VarError::Decode(_))));
    }

    #[tokio::test]
    async fn test_observe_ambiguous() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        backend.append("cfg", "a");
        backend.append("cfg", "b");

        let snapshot = r.observe(None).await.unwrap();
        assert!(matches!(
            snapshot.error(),
            Some(VarError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_update_state_suppresses_equivalent_error() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        let err = || VarError::from(BackendError::new(Code::Unavailable, "down"));

        let first = r.update_state(Snapshot::from_error(err()), None);
        assert!(r.mailbox.try_take().is_some());

        let second = r.update_state(Snapshot::from_error(err()), Some(&first));
        assert!(r.mailbox.try_take().is_none());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_update_state_always_publishes_values() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());

        let prev = r.update_state(Snapshot::from_error(VarError::NotExist), None);
        r.update_state(
            Snapshot::new("v".to_string(), Version::new(1), None),
            Some(&prev),
        );
        let got = r.mailbox.try_take().unwrap();
        assert_eq!(got.value().unwrap(), "v");
    }

    #[tokio::test]
    async fn test_wait_returns_no_subscription_when_stream_closes() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        let state = r.subscribe().await;
        assert!(matches!(state, LoopState::Subscribed(_)));

        backend.drop_subscriptions("cfg");
        let state = r.wait(state, &CancellationToken::new()).await;
        assert!(matches!(state, LoopState::NoSubscription));
    }

    #[tokio::test]
    async fn test_wait_stops_on_cancel() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let state = r.wait(LoopState::NoSubscription, &cancel).await;
        assert!(matches!(state, LoopState::Stopped));
    }

    #[tokio::test]
    async fn test_run_closes_mailbox_on_cancel() {
        let backend = MemoryBackend::new();
        let r = reconciler(&backend, Arc::default());
        let mailbox = Arc::clone(&r.mailbox);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(r.run(cancel.clone()));
        let first = mailbox.recv().await.unwrap();
        assert!(first.error().unwrap().is_not_exist());

        cancel.cancel();
        task.await.unwrap();
        assert!(mailbox.is_closed());
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_closes_mailbox_when_decoder_panics() {
        let backend = MemoryBackend::new();
        backend.set("cfg", "boom");
        let mut r = reconciler(&backend, Arc::default());
        r.decoder = Decoder::new(|_: &[u8]| -> std::result::Result<String, _> {
            panic!("decoder panicked")
        });
        let mailbox = Arc::clone(&r.mailbox);

        let result = tokio::spawn(r.run(CancellationToken::new())).await;
        assert!(result.unwrap_err().is_panic());
        assert!(mailbox.is_closed());
        assert!(mailbox.recv().await.is_none());
    }
}
