// src/fs/mod.rs

//! Filesystem seam used by the tree walker and the router.
//!
//! Errors come back as [`WatchrunError::Stat`] so callers can tell a vanished
//! or unreadable entry (transient) from anything else (fatal).

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, WatchrunError};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Stat `path` and report whether it is a directory, following symlinks.
    fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Whether `path` itself is a directory. A symlink is never one, whatever
    /// it points to.
    fn is_real_dir(&self, path: &Path) -> Result<bool>;

    /// Return the entries of a directory as full paths, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_dir(&self, path: &Path) -> Result<bool> {
        fs::metadata(path)
            .map(|m| m.is_dir())
            .map_err(|e| WatchrunError::stat(path, e))
    }

    fn is_real_dir(&self, path: &Path) -> Result<bool> {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_dir())
            .map_err(|e| WatchrunError::stat(path, e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| WatchrunError::stat(path, e))? {
            let entry = entry.map_err(|e| WatchrunError::stat(path, e))?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}
