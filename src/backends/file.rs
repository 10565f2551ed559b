//! Directory-backed variables with `notify`-driven change events.

use super::versions::VersionTable;
use super::{Backend, ChangeEvent, Entry, QueryResponse, Subscription};
use crate::error::{BackendError, Code};
use async_trait::async_trait;
use parking_lot::Mutex;
use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 16;

/// Raw response attached to snapshots produced by [`FileBackend`].
#[derive(Debug, Clone)]
pub struct FileResponse {
    /// Path that was read.
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub len: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

/// Backend storing each variable as a file under a root directory.
///
/// A variable name is a path relative to the root. A new version is assigned
/// whenever the file content differs from the last read, so rewriting a file
/// with identical bytes is not a change. Clones share version state. Change notifications come from an OS file watcher on the file's
/// parent directory.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar::backends::FileBackend;
///
/// let backend = FileBackend::new("/etc/myapp/vars");
/// // Watches /etc/myapp/vars/feature-flags.json
/// # let _ = backend;
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    versions: Arc<Mutex<VersionTable>>,
}

impl FileBackend {
    /// Create a backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            versions: Arc::default(),
        }
    }

    /// The directory variables are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn io_error(path: &Path, err: io::Error) -> BackendError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => Code::PermissionDenied,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Code::InvalidArgument,
        io::ErrorKind::TimedOut => Code::DeadlineExceeded,
        io::ErrorKind::Interrupted => Code::Aborted,
        _ => Code::Unknown,
    };
    BackendError::new(code, format!("Failed to read {}: {}", path.display(), err)).with_source(err)
}

/// Resolve the directory to watch and the file name inside it.
fn watch_target(path: &Path) -> Result<(PathBuf, PathBuf), BackendError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        BackendError::new(
            Code::InvalidArgument,
            format!("{} does not name a file", path.display()),
        )
    })?;

    // Canonicalize the directory so event paths (always absolute) can be matched
    let dir = parent.canonicalize().map_err(|e| {
        BackendError::new(
            Code::Unavailable,
            format!("Failed to resolve {}: {}", parent.display(), e),
        )
        .with_source(e)
    })?;
    let target = dir.join(file_name);
    Ok((dir, target))
}

#[async_trait]
impl Backend for FileBackend {
    async fn query(&self, name: &str) -> Result<QueryResponse, BackendError> {
        let path = self.path_for(name);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.versions.lock().forget(name);
                return Ok(QueryResponse::new(Vec::new()));
            }
            Err(e) => return Err(io_error(&path, e)),
        };
        let metadata = tokio::fs::metadata(&path).await.ok();

        let raw = FileResponse {
            path: path.clone(),
            len: bytes.len() as u64,
            modified: metadata.and_then(|m| m.modified().ok()),
        };
        let version = self.versions.lock().resolve(name, &bytes);
        Ok(QueryResponse::new(vec![Entry::new(bytes, version)]).with_raw(raw))
    }

    async fn subscribe(&self, name: &str) -> Result<Subscription, BackendError> {
        let (dir, target) = watch_target(&self.path_for(name))?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let event_target = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !event.paths.iter().any(|p| p == &event_target) {
                return;
            }
            // Only care about changes to the content or existence of the file
            let change = match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => ChangeEvent::Put,
                EventKind::Remove(_) => ChangeEvent::Delete,
                _ => return,
            };
            // A full buffer already guarantees a re-query
            let _ = tx.try_send(change);
        })
        .map_err(|e| {
            BackendError::new(
                Code::Unavailable,
                format!("Failed to create file watcher: {}", e),
            )
            .with_source(e)
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                BackendError::new(
                    Code::Unavailable,
                    format!("Failed to watch {}: {}", dir.display(), e),
                )
                .with_source(e)
            })?;

        tracing::debug!(path = %target.display(), "Watching file for changes");
        Ok(Subscription::with_guard(rx, watcher))
    }

    fn name(&self) -> String {
        format!("file:{}", self.root.display())
    }
}
