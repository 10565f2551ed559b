//! Built-in metrics for the watch loop.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Backend query attempts/failures and duration
//! - Decoder invocations and failures
//! - Published and suppressed snapshots
//!
//! # Examples
//!
//! ```rust,no_run
//! use runtimevar::prelude::*;
//! use runtimevar::backends::MemoryBackend;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let watcher = Watcher::builder()
//!     .with_name("cfg/v1")
//!     .with_backend(MemoryBackend::new())
//!     .with_decoder(Decoder::string())
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;
