// src/watch/native.rs

//! Native change notifications through `notify`.
//!
//! Every path is registered non-recursively. A bridge task moves events from
//! the notify callback into the bounded backend streams, translating the
//! event kind into an [`Op`] set and rewriting paths into the form they were
//! registered with.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::anyhow;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::{Result, WatchrunError};
use crate::types::Op;
use crate::watch::backend::{STREAM_CAPACITY, WatchBackend, WatchEvent, WatchStreams};

/// Registered paths plus the spellings notify may report them under.
#[derive(Debug, Default)]
struct Registry {
    paths: BTreeSet<PathBuf>,
    aliases: HashMap<PathBuf, PathBuf>,
}

impl Registry {
    fn insert(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
        for alias in aliases_of(path) {
            self.aliases.insert(alias, path.to_path_buf());
        }
    }

    fn remove(&mut self, path: &Path) -> bool {
        if !self.paths.remove(path) {
            return false;
        }
        self.aliases.retain(|_, given| given != path);
        true
    }

    /// Map a reported path back to its registered spelling.
    fn resolve(&self, reported: &Path) -> PathBuf {
        if let Some(given) = self.aliases.get(reported) {
            return given.clone();
        }
        if let (Some(parent), Some(name)) = (reported.parent(), reported.file_name()) {
            if let Some(given) = self.aliases.get(parent) {
                return given.join(name);
            }
        }
        reported.to_path_buf()
    }
}

/// Absolute and canonical spellings of `path`.
fn aliases_of(path: &Path) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(3);
    out.push(path.to_path_buf());
    if let Ok(abs) = std::path::absolute(path) {
        out.push(abs);
    }
    if let Ok(canon) = path.canonicalize() {
        out.push(canon);
    }
    out
}

/// Native implementation of [`WatchBackend`].
pub struct NativeWatcher {
    /// `None` once closed.
    watcher: Mutex<Option<RecommendedWatcher>>,
    registry: Arc<RwLock<Registry>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for NativeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeWatcher").finish_non_exhaustive()
    }
}

impl NativeWatcher {
    /// Must be called from within a tokio runtime.
    pub fn new(cancel: CancellationToken) -> Result<(Self, WatchStreams)> {
        let handle = Handle::try_current()
            .map_err(|e| anyhow!("native watcher needs a tokio runtime: {e}"))?;

        // Channel from the blocking notify callback into the async world.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Fails only after the bridge has stopped.
                let _ = raw_tx.send(res);
            },
            NotifyConfig::default(),
        )?;

        let (events_tx, events) = mpsc::channel(STREAM_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(STREAM_CAPACITY);
        let registry = Arc::new(RwLock::new(Registry::default()));

        let bridge = Bridge {
            raw_rx,
            events_tx,
            errors_tx,
            registry: Arc::clone(&registry),
            cancel: cancel.clone(),
        };
        handle.spawn(bridge.run());

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
                registry,
                cancel,
            },
            WatchStreams { events, errors },
        ))
    }
}

impl WatchBackend for NativeWatcher {
    fn add(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(watcher) = guard.as_mut() else {
            return Err(WatchrunError::WatcherClosed);
        };

        std::fs::metadata(path).map_err(|e| WatchrunError::stat(path, e))?;

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.paths.contains(path) {
            return Ok(());
        }
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        registry.insert(path);
        debug!(path = %path.display(), "native watch added");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(watcher) = guard.as_mut() else {
            return Ok(());
        };

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if !registry.remove(path) {
            return Err(WatchrunError::NonExistentWatch(path.to_path_buf()));
        }
        if let Err(err) = watcher.unwatch(path) {
            // The OS drops watches on deleted paths by itself.
            debug!(path = %path.display(), error = %err, "unwatch failed");
        }
        Ok(())
    }

    fn watch_list(&self) -> Vec<PathBuf> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.paths.iter().cloned().collect()
    }

    fn close(&self) {
        let mut guard = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_none() {
            return;
        }
        self.cancel.cancel();
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        *registry = Registry::default();
    }
}

impl Drop for NativeWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Translate a notify event kind into the operation it reports.
///
/// `None` means the event is dropped: accesses carry no change, and
/// `RenameMode::Both` duplicates the separate `From` / `To` events.
pub(crate) fn op_for_kind(kind: &EventKind) -> Option<Op> {
    match kind {
        EventKind::Create(_) => Some(Op::CREATE),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(Op::CHMOD),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Op::RENAME),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Op::CREATE),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => Some(Op::RENAME),
        EventKind::Modify(_) => Some(Op::WRITE),
        EventKind::Remove(_) => Some(Op::REMOVE),
        EventKind::Any => Some(Op::WRITE),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// A rename reported without a direction (FSEvents does this for both ends)
/// counts as a CREATE too when a directory now sits at `path`, so a tree
/// moved into a target gets walked.
fn settle_rename(kind: &EventKind, path: &Path, op: Op) -> Op {
    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) if path.is_dir() => op | Op::CREATE,
        _ => op,
    }
}

struct Bridge {
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    events_tx: mpsc::Sender<WatchEvent>,
    errors_tx: mpsc::Sender<WatchrunError>,
    registry: Arc<RwLock<Registry>>,
    cancel: CancellationToken,
}

impl Bridge {
    async fn run(mut self) {
        loop {
            let res = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                res = self.raw_rx.recv() => match res {
                    Some(res) => res,
                    None => break,
                },
            };

            match res {
                Ok(event) => {
                    trace!(?event, "received notify event");
                    for ev in self.translate(event) {
                        if !self.send(ev).await {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let sent = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => false,
                        res = self.errors_tx.send(err.into()) => res.is_ok(),
                    };
                    if !sent {
                        return;
                    }
                }
            }
        }
        debug!("native watcher bridge finished");
    }

    fn translate(&self, event: Event) -> Vec<WatchEvent> {
        let Some(op) = op_for_kind(&event.kind) else {
            return Vec::new();
        };
        let ops: Vec<Op> = event
            .paths
            .iter()
            .map(|reported| settle_rename(&event.kind, reported, op))
            .collect();

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        event
            .paths
            .into_iter()
            .zip(ops)
            .map(|(reported, op)| {
                let path = registry.resolve(&reported);
                if op.contains(Op::REMOVE) && registry.paths.contains(&path) {
                    // The OS has already dropped the watch on a deleted path.
                    registry.remove(&path);
                }
                WatchEvent::new(path, op)
            })
            .collect()
    }

    async fn send(&self, ev: WatchEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.events_tx.send(ev) => res.is_ok(),
        }
    }
}
