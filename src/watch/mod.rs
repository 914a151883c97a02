// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling trigger / ignore glob patterns.
//! - Two interchangeable change detectors behind [`WatchBackend`]: native
//!   OS notifications (`notify`) and a polling watcher.
//! - Registering watch targets recursively, and extending the watch set as
//!   directories appear.
//! - Routing raw events into restart triggers.
//!
//! It does **not** know about the child process; it only turns filesystem
//! changes into trigger paths.

pub mod backend;
pub mod native;
pub mod patterns;
pub mod poller;
pub mod router;
pub mod walker;

use std::path::{Component, Path, PathBuf};

pub use backend::{new_backend, WatchBackend, WatchEvent, WatchStreams};
pub use native::NativeWatcher;
pub use patterns::{MatchRules, PathClass, PatternSet};
pub use poller::Poller;
pub use router::EventRouter;
pub use walker::{walk, WalkOptions, WalkReport};

/// Forward-slash string form of `path`, as matched against glob patterns.
pub fn slash_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lexically clean a target path: drop `.` segments and repeated or
/// trailing separators. An empty result becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir if out.as_os_str().is_empty() => out.push("."),
            Component::CurDir => {}
            other => {
                if out == Path::new(".") {
                    out = PathBuf::new();
                }
                out.push(other);
            }
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_matches_lexical_rules() {
        assert_eq!(clean_path(Path::new("./")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("./src/")), PathBuf::from("src"));
        assert_eq!(clean_path(Path::new("a//b/./c")), PathBuf::from("a/b/c"));
        assert_eq!(clean_path(Path::new("/tmp/t/")), PathBuf::from("/tmp/t"));
    }

    #[cfg(windows)]
    #[test]
    fn slash_str_normalises_separators() {
        assert_eq!(slash_str(Path::new(r"a\b\c.go")), "a/b/c.go");
    }

    #[test]
    fn slash_str_keeps_forward_slashes() {
        assert_eq!(slash_str(Path::new("./a/b.go")), "./a/b.go");
    }
}
