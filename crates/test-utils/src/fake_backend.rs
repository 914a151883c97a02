use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use watchrun::errors::{Result, WatchrunError};
use watchrun::watch::WatchBackend;

/// A backend that records registrations and never produces events itself.
///
/// Tests drive the router by feeding a hand-made `WatchStreams`.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    added: Mutex<Vec<PathBuf>>,
    closed: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path passed to `add`, in call order.
    pub fn added(&self) -> Vec<PathBuf> {
        self.added.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl WatchBackend for RecordingBackend {
    fn add(&self, path: &Path) -> Result<()> {
        if self.is_closed() {
            return Err(WatchrunError::WatcherClosed);
        }
        let mut added = self.added.lock().unwrap();
        if !added.iter().any(|p| p == path) {
            added.push(path.to_path_buf());
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let mut added = self.added.lock().unwrap();
        match added.iter().position(|p| p == path) {
            Some(idx) => {
                added.remove(idx);
                Ok(())
            }
            None => Err(WatchrunError::NonExistentWatch(path.to_path_buf())),
        }
    }

    fn watch_list(&self) -> Vec<PathBuf> {
        let mut list = self.added();
        list.sort();
        list
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
