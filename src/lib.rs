//! # runtimevar
//!
//! Watch named runtime variables held in external stores and receive their
//! latest decoded value as it changes.
//!
//! ## Overview
//!
//! `runtimevar` runs one background task per watched variable that:
//! - Queries the backend with a bounded timeout
//! - Waits for change notifications, falling back to polling when a backend has none
//! - Decodes only when the stored version changed
//! - Publishes through a single-slot mailbox so slow consumers only see the newest value
//! - Collapses runs of equivalent errors into one delivered snapshot
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use runtimevar::prelude::*;
//! use runtimevar::backends::MemoryBackend;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct FeatureFlags {
//!     dark_mode: bool,
//! }
//!
//! # async fn example() -> runtimevar::error::Result<()> {
//! let backend = MemoryBackend::new();
//! backend.set("flags", r#"{"dark_mode": true}"#);
//!
//! let watcher = Watcher::builder()
//!     .with_name("flags")
//!     .with_backend(backend.clone())
//!     .with_decoder(Decoder::<FeatureFlags>::json())
//!     .build()?;
//!
//! let (snapshot, _) = watcher.pull_next(None).await;
//! match snapshot.value() {
//!     Ok(flags) => println!("dark mode: {}", flags.dark_mode),
//!     Err(e) => eprintln!("flags unavailable: {}", e),
//! }
//!
//! watcher.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Never-blocking producer**: the loop overwrites unread snapshots
//! - **Typed errors**: backend failures keep their status code for inspection
//! - **Pluggable backends**: in-memory, file system and HTTP out of the box
//! - **Config loading**: timeouts from files or environment variables
//! - **Metrics**: optional OpenTelemetry instrumentation
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! runtimevar = { version = "0.1", features = ["remote", "yaml"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod backends;
pub mod core;
pub mod error;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::backends::Backend;
    pub use crate::core::{Decoder, Snapshot, Version, WatchOptions, Watcher, WatcherBuilder};
    pub use crate::error::{BackendError, Code, Result, VarError};
}
