//! Core watch types: snapshots, the mailbox, the reconciliation loop and the watcher.

mod builder;
mod decoder;
mod equivalence;
mod mailbox;
mod options;
pub(crate) mod reconcile;
mod snapshot;
mod watcher;

pub use builder::WatcherBuilder;
pub use decoder::{DecodeError, Decoder};
pub use equivalence::equivalent_error;
pub use mailbox::Mailbox;
pub use options::{DEFAULT_TIMEOUT, WatchOptions};
pub use snapshot::{RawResponse, Snapshot, Version};
pub use watcher::Watcher;
