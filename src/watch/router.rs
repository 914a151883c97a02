// src/watch/router.rs

//! Turns raw backend events into restart triggers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::errors::{Result, WatchrunError};
use crate::fs::FileSystem;
use crate::types::Op;
use crate::watch::backend::{WatchBackend, WatchEvent, WatchStreams};
use crate::watch::patterns::{MatchRules, PathClass};
use crate::watch::slash_str;
use crate::watch::walker::{walk, WalkOptions};

/// Consumes a backend's streams and forwards qualifying paths to the
/// trigger input.
///
/// A directory announced by a `CREATE` event is walked (and its matching
/// entries forwarded) before the next event is looked at.
#[derive(Debug)]
pub struct EventRouter {
    backend: Arc<dyn WatchBackend>,
    fs: Arc<dyn FileSystem>,
    rules: Arc<MatchRules>,
    trigger_mask: Op,
    triggers: mpsc::UnboundedSender<PathBuf>,
}

impl EventRouter {
    pub fn new(
        backend: Arc<dyn WatchBackend>,
        fs: Arc<dyn FileSystem>,
        rules: Arc<MatchRules>,
        trigger_mask: Op,
        triggers: mpsc::UnboundedSender<PathBuf>,
    ) -> Self {
        Self {
            backend,
            fs,
            rules,
            trigger_mask,
            triggers,
        }
    }

    /// Route events until `cancel` fires.
    ///
    /// Returns an error when the backend reports one, when its streams close
    /// underneath us, or when extending the watch set fails.
    pub async fn run(self, mut streams: WatchStreams, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                err = streams.errors.recv() => {
                    return Err(err.unwrap_or(WatchrunError::WatcherClosed));
                }
                ev = streams.events.recv() => {
                    let Some(ev) = ev else {
                        return Err(WatchrunError::WatcherClosed);
                    };
                    if !self.route(ev).await? {
                        debug!("trigger input closed; router stopping");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle one event. Returns false once the trigger input is gone.
    async fn route(&self, ev: WatchEvent) -> Result<bool> {
        let name = slash_str(&ev.path);
        let class = self.rules.classify(&name);
        if class == PathClass::Ignored {
            trace!(path = %name, op = %ev.op, "ignored");
            return Ok(true);
        }

        if class == PathClass::Triggering && ev.op.intersects(self.trigger_mask) {
            debug!(path = %name, op = %ev.op, "modified");
            if self.triggers.send(ev.path.clone()).is_err() {
                return Ok(false);
            }
        }

        if ev.op.contains(Op::CREATE) {
            for path in self.extend(ev.path).await? {
                debug!(path = %slash_str(&path), "found in new directory");
                if self.triggers.send(path).is_err() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Walk `path` if it is a new directory. Returns the matches it holds.
    async fn extend(&self, path: PathBuf) -> Result<Vec<PathBuf>> {
        let backend = Arc::clone(&self.backend);
        let fs = Arc::clone(&self.fs);
        let rules = Arc::clone(&self.rules);

        tokio::task::spawn_blocking(move || {
            match fs.is_dir(&path) {
                Ok(true) => {}
                Ok(false) => return Ok(Vec::new()),
                Err(err) if err.is_transient() => {
                    warn!(path = %slash_str(&path), error = %err, "watcher");
                    return Ok(Vec::new());
                }
                Err(err) => return Err(err),
            }

            let options = WalkOptions {
                report_matches: true,
            };
            match walk(backend.as_ref(), fs.as_ref(), &path, &rules, options) {
                Ok(report) => Ok(report.matched),
                // Removed again before we got to it.
                Err(err) if err.is_transient() => {
                    warn!(path = %slash_str(&path), error = %err, "watcher");
                    Ok(Vec::new())
                }
                Err(err) => Err(err),
            }
        })
        .await
        .map_err(|e| WatchrunError::Other(anyhow!("directory walk panicked: {e}")))?
    }
}
