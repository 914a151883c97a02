// src/watch/poller.rs

//! Polling change detector.
//!
//! Every registered path gets its own task that wakes on a fixed interval and
//! diffs a fingerprint of the path (and, for directories, of its immediate
//! entries) against the previous scan. Subdirectory contents are never
//! inspected; the tree walker registers subdirectories separately.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use anyhow::anyhow;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::{Result, WatchrunError};
use crate::types::Op;
use crate::watch::backend::{STREAM_CAPACITY, WatchBackend, WatchEvent, WatchStreams};

/// What a scan compares between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    mode: u32,
    modified: Option<SystemTime>,
    size: u64,
    is_dir: bool,
}

impl Fingerprint {
    fn of(meta: &Metadata) -> Self {
        Self {
            mode: mode_of(meta),
            modified: meta.modified().ok(),
            size: meta.len(),
            is_dir: meta.is_dir(),
        }
    }

    fn content_changed(&self, prev: &Fingerprint) -> bool {
        self.modified != prev.modified || self.size != prev.size
    }
}

#[cfg(unix)]
fn mode_of(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(meta: &Metadata) -> u32 {
    (u32::from(meta.is_dir()) << 1) | u32::from(meta.permissions().readonly())
}

/// Initial state of one watch, captured synchronously by `add`.
enum Snapshot {
    File(Fingerprint),
    Dir {
        mode: u32,
        entries: HashMap<OsString, Fingerprint>,
    },
}

#[derive(Clone)]
struct Senders {
    events: mpsc::Sender<WatchEvent>,
    errors: mpsc::Sender<WatchrunError>,
}

#[derive(Default)]
struct Registry {
    closed: bool,
    watches: BTreeMap<PathBuf, CancellationToken>,
}

struct Inner {
    interval: Duration,
    cancel: CancellationToken,
    handle: Handle,
    registry: RwLock<Registry>,
    /// Dropped on close so the streams end once the last loop exits.
    senders: Mutex<Option<Senders>>,
}

impl Inner {
    fn registry(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget `path` after its loop ended on its own.
    ///
    /// A cancelled token means `remove` or `close` already dropped the entry
    /// (and a later `add` may have registered a fresh one), so it is left
    /// alone.
    fn deregister(&self, path: &Path, token: &CancellationToken) {
        let mut registry = self.registry();
        if token.is_cancelled() {
            return;
        }
        registry.watches.remove(path);
        token.cancel();
        debug!(path = %path.display(), "polling stopped");
    }
}

/// Polling implementation of [`WatchBackend`].
pub struct Poller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.inner.interval)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Create a poller scanning every `interval`.
    ///
    /// Must be called from within a tokio runtime; watch loops are spawned on
    /// that runtime even when `add` is called from a blocking thread.
    pub fn new(interval: Duration, cancel: CancellationToken) -> Result<(Self, WatchStreams)> {
        let handle = Handle::try_current()
            .map_err(|e| anyhow!("polling watcher needs a tokio runtime: {e}"))?;
        let (events_tx, events) = mpsc::channel(STREAM_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(STREAM_CAPACITY);

        let inner = Inner {
            interval,
            cancel,
            handle,
            registry: RwLock::new(Registry::default()),
            senders: Mutex::new(Some(Senders {
                events: events_tx,
                errors: errors_tx,
            })),
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            WatchStreams { events, errors },
        ))
    }
}

impl WatchBackend for Poller {
    fn add(&self, path: &Path) -> Result<()> {
        let mut registry = self.inner.registry();
        if registry.closed {
            return Err(WatchrunError::WatcherClosed);
        }

        let meta = std::fs::metadata(path).map_err(|e| WatchrunError::stat(path, e))?;
        if registry.watches.contains_key(path) {
            return Ok(());
        }

        let senders = self
            .inner
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(WatchrunError::WatcherClosed)?;

        let snapshot = if meta.is_dir() {
            Snapshot::Dir {
                mode: mode_of(&meta),
                entries: snapshot_dir(path)?,
            }
        } else {
            Snapshot::File(Fingerprint::of(&meta))
        };

        let token = self.inner.cancel.child_token();
        registry.watches.insert(path.to_path_buf(), token.clone());

        let watch = PollLoop {
            path: path.to_path_buf(),
            interval: self.inner.interval,
            token,
            senders,
        };
        let inner = Arc::clone(&self.inner);
        self.inner.handle.spawn(async move {
            match snapshot {
                Snapshot::File(fp) => watch.poll_file(fp).await,
                Snapshot::Dir { mode, entries } => watch.poll_dir(mode, entries).await,
            }
            inner.deregister(&watch.path, &watch.token);
        });

        debug!(path = %path.display(), "polling started");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut registry = self.inner.registry();
        if registry.closed {
            return Ok(());
        }
        match registry.watches.remove(path) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(WatchrunError::NonExistentWatch(path.to_path_buf())),
        }
    }

    fn watch_list(&self) -> Vec<PathBuf> {
        let registry = self.inner.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.watches.keys().cloned().collect()
    }

    fn close(&self) {
        let mut registry = self.inner.registry();
        if registry.closed {
            return;
        }
        registry.closed = true;
        registry.watches.clear();
        self.inner.cancel.cancel();
        self.inner
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.close();
    }
}

fn snapshot_dir(path: &Path) -> Result<HashMap<OsString, Fingerprint>> {
    let mut entries = HashMap::new();
    for entry in std::fs::read_dir(path).map_err(|e| WatchrunError::stat(path, e))? {
        let entry = entry.map_err(|e| WatchrunError::stat(path, e))?;
        match entry.metadata() {
            Ok(meta) => {
                entries.insert(entry.file_name(), Fingerprint::of(&meta));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(WatchrunError::stat(entry.path(), e)),
        }
    }
    Ok(entries)
}

/// One watched path's scan loop.
struct PollLoop {
    path: PathBuf,
    interval: Duration,
    token: CancellationToken,
    senders: Senders,
}

impl PollLoop {
    fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Returns false when the watch was cancelled or the receiver is gone.
    async fn send_event(&self, path: PathBuf, op: Op) -> bool {
        trace!(path = %path.display(), %op, "poll event");
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            res = self.senders.events.send(WatchEvent::new(path, op)) => res.is_ok(),
        }
    }

    async fn send_error(&self, err: WatchrunError) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            res = self.senders.errors.send(err) => res.is_ok(),
        }
    }

    async fn poll_file(&self, mut prev: Fingerprint) {
        let mut ticker = self.ticker();
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let cur = match tokio::fs::metadata(&self.path).await {
                Ok(meta) => Fingerprint::of(&meta),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.send_event(self.path.clone(), Op::REMOVE).await;
                    return;
                }
                Err(e) => {
                    if !self.send_error(WatchrunError::stat(&self.path, e)).await {
                        return;
                    }
                    continue;
                }
            };

            if cur.mode != prev.mode && !self.send_event(self.path.clone(), Op::CHMOD).await {
                return;
            }
            if cur.content_changed(&prev) && !self.send_event(self.path.clone(), Op::WRITE).await
            {
                return;
            }
            prev = cur;
        }
    }

    async fn poll_dir(&self, mut mode: u32, mut prev: HashMap<OsString, Fingerprint>) {
        let mut ticker = self.ticker();
        'scan: loop {
            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match tokio::fs::metadata(&self.path).await {
                Ok(meta) => {
                    let m = mode_of(&meta);
                    if m != mode {
                        mode = m;
                        if !self.send_event(self.path.clone(), Op::CHMOD).await {
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return,
                Err(e) => {
                    if !self.send_error(WatchrunError::stat(&self.path, e)).await {
                        return;
                    }
                    continue;
                }
            }

            let mut read_dir = match tokio::fs::read_dir(&self.path).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return,
                Err(e) => {
                    if !self.send_error(WatchrunError::stat(&self.path, e)).await {
                        return;
                    }
                    continue;
                }
            };

            let mut listing = Vec::new();
            loop {
                match read_dir.next_entry().await {
                    Ok(Some(entry)) => {
                        let meta = entry.metadata().await;
                        listing.push((entry.file_name(), meta));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Incomplete listing: keep the previous snapshot.
                        if !self.send_error(WatchrunError::stat(&self.path, e)).await {
                            return;
                        }
                        continue 'scan;
                    }
                }
            }

            let mut cur = HashMap::with_capacity(listing.len());
            for (name, meta) in listing {
                let full = self.path.join(&name);
                let fp = match meta {
                    Ok(meta) => Fingerprint::of(&meta),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        prev.remove(&name);
                        if !self.send_event(full, Op::REMOVE).await {
                            return;
                        }
                        continue;
                    }
                    Err(e) => {
                        if let Some(old) = prev.remove(&name) {
                            cur.insert(name, old);
                        }
                        if !self.send_error(WatchrunError::stat(&full, e)).await {
                            return;
                        }
                        continue;
                    }
                };
                cur.insert(name.clone(), fp);

                let Some(old) = prev.remove(&name) else {
                    if !self.send_event(full, Op::CREATE).await {
                        return;
                    }
                    continue;
                };
                if fp.mode != old.mode && !self.send_event(full.clone(), Op::CHMOD).await {
                    return;
                }
                if !fp.is_dir && fp.content_changed(&old) && !self.send_event(full, Op::WRITE).await {
                    return;
                }
            }

            let mut gone: Vec<_> = prev.into_keys().collect();
            gone.sort();
            for name in gone {
                if !self.send_event(self.path.join(name), Op::REMOVE).await {
                    return;
                }
            }
            prev = cur;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller() -> (Poller, WatchStreams) {
        Poller::new(Duration::from_millis(50), CancellationToken::new()).expect("runtime")
    }

    #[tokio::test]
    async fn add_missing_path_is_a_stat_error() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _streams) = poller();

        let err = p.add(&dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
        assert!(p.watch_list().is_empty());
    }

    #[tokio::test]
    async fn registration_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _streams) = poller();

        p.add(dir.path()).unwrap();
        p.add(dir.path()).unwrap();
        assert_eq!(p.watch_list(), vec![dir.path().to_path_buf()]);

        assert!(matches!(
            p.remove(&dir.path().join("other")),
            Err(WatchrunError::NonExistentWatch(_))
        ));
        p.remove(dir.path()).unwrap();
        assert!(p.watch_list().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_streams() {
        let dir = tempfile::tempdir().unwrap();
        let (p, mut streams) = poller();
        p.add(dir.path()).unwrap();

        p.close();
        p.close();

        assert!(matches!(p.add(dir.path()), Err(WatchrunError::WatcherClosed)));
        assert!(p.remove(dir.path()).is_ok());
        assert!(streams.events.recv().await.is_none());
        assert!(streams.errors.recv().await.is_none());
    }
}
