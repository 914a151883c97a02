// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("stat {path:?}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher already closed")]
    WatcherClosed,

    #[error("can't remove non-existent watch: {0:?}")]
    NonExistentWatch(PathBuf),

    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to signal process group {pid}: {reason}")]
    Terminate { pid: u32, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchrunError {
    /// Build a [`WatchrunError::Stat`] for `path`.
    pub fn stat(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WatchrunError::Stat {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a vanished path (or an IO error saying so).
    pub fn is_not_found(&self) -> bool {
        match self {
            WatchrunError::Stat { source, .. } | WatchrunError::IoError(source) => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Stat errors the walker and the router treat as transient: vanished,
    /// unreadable, or a symlink loop.
    pub fn is_transient(&self) -> bool {
        match self {
            WatchrunError::Stat { source, .. } | WatchrunError::IoError(source) => {
                matches!(
                    source.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                ) || is_symlink_loop(source)
            }
            _ => false,
        }
    }
}

#[cfg(unix)]
fn is_symlink_loop(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::ELOOP as i32)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &std::io::Error) -> bool {
    false
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchrunError>;
