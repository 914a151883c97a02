// src/watch/walker.rs

//! Recursive registration of watch targets.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::backend::WatchBackend;
use crate::watch::patterns::{MatchRules, PathClass};
use crate::watch::slash_str;

/// Outcome of one [`walk`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Paths handed to the backend, in visiting order.
    pub registered: Vec<PathBuf>,
    /// Entries below the root that match a trigger pattern. Only filled when
    /// [`WalkOptions::report_matches`] is set.
    pub matched: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Report trigger-pattern matches found while walking.
    ///
    /// Off for the startup pass; on when a directory shows up later, so that
    /// files inside a moved-in tree trigger a restart.
    pub report_matches: bool,
}

/// Register `root` with `backend` and, if it is a directory, every
/// subdirectory not covered by an ignore pattern.
///
/// Errors on `root` itself are returned to the caller. Below the root, entries
/// that vanish, cannot be read or loop are logged and skipped; any other error
/// aborts the walk. A symlinked root is followed, symlinks below it are not.
pub fn walk(
    backend: &dyn WatchBackend,
    fs: &dyn FileSystem,
    root: &Path,
    rules: &MatchRules,
    options: WalkOptions,
) -> Result<WalkReport> {
    let mut report = WalkReport::default();

    if fs.is_dir(root)? {
        walk_dir(backend, fs, root, rules, options, &mut report)?;
    } else {
        register(backend, root, &mut report)?;
    }

    Ok(report)
}

fn register(backend: &dyn WatchBackend, path: &Path, report: &mut WalkReport) -> Result<()> {
    debug!(path = %path.display(), "watching target");
    backend.add(path)?;
    report.registered.push(path.to_path_buf());
    Ok(())
}

fn walk_dir(
    backend: &dyn WatchBackend,
    fs: &dyn FileSystem,
    dir: &Path,
    rules: &MatchRules,
    options: WalkOptions,
    report: &mut WalkReport,
) -> Result<()> {
    register(backend, dir, report)?;

    let entries = fs.read_dir(dir)?;
    for entry in entries {
        let name = slash_str(&entry);
        match rules.classify(&name) {
            PathClass::Ignored => continue,
            PathClass::Triggering if options.report_matches => report.matched.push(entry.clone()),
            PathClass::Triggering | PathClass::Unmatched => {}
        }

        // Symlinked directories are not descended into.
        let is_dir = match fs.is_real_dir(&entry) {
            Ok(is_dir) => is_dir,
            Err(err) if err.is_transient() => {
                warn!(path = %name, error = %err, "skipping entry");
                continue;
            }
            Err(err) => return Err(err),
        };
        if !is_dir {
            continue;
        }

        match walk_dir(backend, fs, &entry, rules, options, report) {
            Ok(()) => {}
            Err(err) if err.is_transient() => {
                warn!(path = %name, error = %err, "skipping directory");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
