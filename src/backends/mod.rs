//! Backend implementations the watch loop can observe.

mod backend;
mod memory;

#[cfg(feature = "file-watch")]
mod file;

#[cfg(feature = "remote")]
mod remote;

#[cfg(any(feature = "file-watch", feature = "remote"))]
mod versions;

pub use backend::{Backend, ChangeEvent, Entry, QueryResponse, Subscription};
pub use memory::{MemoryBackend, MemoryResponse};

#[cfg(feature = "file-watch")]
pub use file::{FileBackend, FileResponse};

#[cfg(feature = "remote")]
pub use remote::{HttpAuth, HttpBackend, HttpBackendBuilder, HttpResponse};
