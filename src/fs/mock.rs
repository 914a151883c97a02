// src/fs/mock.rs

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::FileSystem;
use crate::errors::{Result, WatchrunError};

#[derive(Debug, Clone)]
enum MockEntry {
    File,
    Dir,
    /// A symlink pointing at a directory.
    DirLink,
    /// Any access fails with this kind.
    Broken(io::ErrorKind),
}

/// In-memory tree for walker tests.
///
/// Parent directories are created implicitly. Entries can be marked broken
/// to simulate races (`NotFound`) or unreadable directories
/// (`PermissionDenied`).
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::File);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Dir);
    }

    /// Add a symlink that resolves to a directory.
    pub fn add_dir_link(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::DirLink);
    }

    /// Make every access to `path` fail with `kind`.
    pub fn break_entry(&self, path: impl AsRef<Path>, kind: io::ErrorKind) {
        self.insert(path.as_ref(), MockEntry::Broken(kind));
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let mut entries = self.entries.lock().unwrap();
        let mut parent = path.parent();
        while let Some(p) = parent {
            if p.as_os_str().is_empty() {
                break;
            }
            entries.entry(p.to_path_buf()).or_insert(MockEntry::Dir);
            parent = p.parent();
        }
        entries.insert(path.to_path_buf(), entry);
    }

    fn lookup(&self, path: &Path) -> Result<MockEntry> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::Broken(kind)) => Err(WatchrunError::stat(path, io::Error::from(*kind))),
            Some(entry) => Ok(entry.clone()),
            None => Err(WatchrunError::stat(
                path,
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.lookup(path)?, MockEntry::Dir | MockEntry::DirLink))
    }

    fn is_real_dir(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.lookup(path)?, MockEntry::Dir))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lookup(path)? {
            MockEntry::Dir | MockEntry::DirLink => {}
            _ => {
                return Err(WatchrunError::stat(
                    path,
                    io::Error::new(io::ErrorKind::Other, "not a directory"),
                ));
            }
        }
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_implicit() {
        let fs = MockFileSystem::new();
        fs.add_file("/w/sub/a.go");

        assert!(fs.is_dir(Path::new("/w")).unwrap());
        assert_eq!(
            fs.read_dir(Path::new("/w")).unwrap(),
            vec![PathBuf::from("/w/sub")]
        );
        assert!(!fs.is_dir(Path::new("/w/sub/a.go")).unwrap());
    }

    #[test]
    fn broken_entries_fail_with_their_kind() {
        let fs = MockFileSystem::new();
        fs.break_entry("/w/locked", io::ErrorKind::PermissionDenied);

        let err = fs.read_dir(Path::new("/w/locked")).unwrap_err();
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }
}
