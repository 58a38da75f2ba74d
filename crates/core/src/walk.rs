//! Lazy traversal of every entry below a root directory
//!
//! Shared by the snapshot builder and by the executor when it logs the
//! contents of a directory it is about to remove.

use crate::error::{MirrorError, Result};
use std::fs::FileType;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link (never followed)
    Symlink,
}

impl EntryKind {
    /// Classify a file type without following links
    pub fn from_file_type(ft: FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        }
    }
}

/// An entry discovered below the walk root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walk root
    pub rel_path: PathBuf,
    /// Kind of entry
    pub kind: EntryKind,
}

/// Iterator over all entries below a root (the root itself is excluded)
///
/// Parents are yielded before their children. Entries removed while the walk
/// is in progress are skipped; other traversal failures are yielded as
/// [`MirrorError::Walk`] and the walk continues with the next entry.
pub struct TreeWalk {
    root: PathBuf,
    inner: Option<walkdir::IntoIter>,
}

/// Start walking `root`
///
/// A root that does not exist yields an empty walk. Each call starts a fresh
/// traversal, so the same root can be walked any number of times.
pub fn walk(root: &Path) -> TreeWalk {
    let inner = match std::fs::symlink_metadata(root) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        _ => Some(
            WalkDir::new(root)
                .min_depth(1)
                .follow_links(false)
                .into_iter(),
        ),
    };

    TreeWalk {
        root: root.to_path_buf(),
        inner,
    }
}

impl TreeWalk {
    /// Root this walk started from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for TreeWalk {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;

        loop {
            match inner.next()? {
                Ok(entry) => {
                    let rel_path = match entry.path().strip_prefix(&self.root) {
                        Ok(rel) => rel.to_path_buf(),
                        Err(_) => continue,
                    };
                    return Some(Ok(WalkEntry {
                        rel_path,
                        kind: EntryKind::from_file_type(entry.file_type()),
                    }));
                }
                Err(err) => {
                    let vanished = err
                        .io_error()
                        .map(|e| e.kind() == io::ErrorKind::NotFound)
                        .unwrap_or(false);
                    if vanished {
                        continue;
                    }
                    return Some(Err(MirrorError::Walk {
                        root: self.root.clone(),
                        source: err,
                    }));
                }
            }
        }
    }
}
