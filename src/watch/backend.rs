// src/watch/backend.rs

//! Uniform interface over the native and polling change detectors.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, WatchrunError};
use crate::types::Op;
use crate::watch::native::NativeWatcher;
use crate::watch::poller::Poller;

/// Capacity of the event and error streams handed out by a backend.
pub const STREAM_CAPACITY: usize = 1;

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub op: Op,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Receiving ends of a backend's streams.
///
/// Both close exactly once, after [`WatchBackend::close`] has been called and
/// every internal task has stopped.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: mpsc::Receiver<WatchEvent>,
    pub errors: mpsc::Receiver<WatchrunError>,
}

/// Change detection backend.
///
/// Registration is non-recursive: adding a directory reports changes to its
/// immediate entries only. The tree walker registers subdirectories itself.
pub trait WatchBackend: Send + Sync + Debug {
    /// Start watching `path`.
    ///
    /// Fails with a stat error if the path does not exist and with
    /// [`WatchrunError::WatcherClosed`] after [`close`](Self::close). Adding
    /// a path twice is a no-op.
    fn add(&self, path: &Path) -> Result<()>;

    /// Stop watching `path`.
    ///
    /// Fails with [`WatchrunError::NonExistentWatch`] for an unknown path;
    /// a no-op after [`close`](Self::close).
    fn remove(&self, path: &Path) -> Result<()>;

    /// Currently registered paths, sorted.
    fn watch_list(&self) -> Vec<PathBuf>;

    /// Release all watches. Idempotent.
    fn close(&self);
}

/// Build the backend selected by `polling_interval`: zero picks native
/// notifications, anything else the polling watcher.
///
/// Must be called from within a tokio runtime. `cancel` bounds the lifetime
/// of every task the backend spawns.
pub fn new_backend(
    polling_interval: Duration,
    cancel: &CancellationToken,
) -> Result<(Arc<dyn WatchBackend>, WatchStreams)> {
    if polling_interval.is_zero() {
        debug!("using native watch backend");
        let (watcher, streams) = NativeWatcher::new(cancel.child_token())?;
        Ok((Arc::new(watcher), streams))
    } else {
        debug!(interval = ?polling_interval, "using polling watch backend");
        let (poller, streams) = Poller::new(polling_interval, cancel.child_token())?;
        Ok((Arc::new(poller), streams))
    }
}
