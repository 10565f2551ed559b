//! Builder for constructing Watcher instances.

use crate::backends::Backend;
use crate::core::reconcile::Reconciler;
use crate::core::{Decoder, Mailbox, WatchOptions, Watcher};
use crate::error::{Result, VarError};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Builder for constructing a [`Watcher`].
///
/// Provides a fluent interface for naming the variable, choosing the backend and
/// decoder, and tuning the watch loop.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar::prelude::*;
/// use runtimevar::backends::MemoryBackend;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let watcher = Watcher::builder()
///     .with_name("cfg/v1")
///     .with_backend(MemoryBackend::new())
///     .with_decoder(Decoder::string())
///     .with_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct WatcherBuilder<T> {
    name: Option<String>,
    backend: Option<Arc<dyn Backend>>,
    decoder: Option<Decoder<T>>,
    options: WatchOptions,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl<T> WatcherBuilder<T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: None,
            backend: None,
            decoder: None,
            options: WatchOptions::default(),
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Set the name of the variable to watch.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the backend holding the variable.
    pub fn with_backend<B: Backend + 'static>(mut self, backend: B) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set a backend that is shared with other watchers.
    pub fn with_shared_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the decoder converting raw bytes into values.
    pub fn with_decoder(mut self, decoder: Decoder<T>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Replace all watch options at once.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use runtimevar::prelude::*;
    ///
    /// # fn example() -> Result<()> {
    /// let options = WatchOptions::load(None, Some("APP"))?;
    /// let builder = Watcher::builder::<String>().with_options(options);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound each backend call by `timeout`.
    ///
    /// Default is 30 seconds; a zero duration also selects the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Set how often to query while no change subscription is open.
    ///
    /// Defaults to the per-call timeout.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = Some(interval);
        self
    }

    /// Record OpenTelemetry metrics for the watch loop.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.meter = Some(meter);
        self
    }
}

impl<T: Send + Sync + 'static> WatcherBuilder<T> {
    /// Build the watcher and start its background task.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No name, backend or decoder was provided
    /// - No Tokio runtime is available
    pub fn build(self) -> Result<Watcher<T>> {
        let name = self
            .name
            .ok_or_else(|| VarError::Config("A variable name is required".to_string()))?;
        let backend = self
            .backend
            .ok_or_else(|| VarError::Config("A backend is required".to_string()))?;
        let decoder = self
            .decoder
            .ok_or_else(|| VarError::Config("A decoder is required".to_string()))?;

        #[cfg(feature = "metrics")]
        let metrics = self.meter.map(|meter| WatchMetrics::new(meter, name.clone()));

        let reconciler = Reconciler {
            name,
            backend,
            decoder,
            timeout: self.options.effective_timeout(),
            poll_interval: self.options.effective_poll_interval(),
            mailbox: Arc::new(Mailbox::new()),
            #[cfg(feature = "metrics")]
            metrics,
        };

        Watcher::start(reconciler)
    }
}

impl<T> Default for WatcherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
