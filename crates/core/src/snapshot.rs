//! Point-in-time snapshots of a directory tree's shape

use crate::error::Result;
use crate::walk::{walk, EntryKind};
use ahash::AHashMap;
use std::path::{Path, PathBuf};

/// The set of relative paths under one root at one instant
///
/// Built once by [`Snapshot::scan`] and never mutated afterwards. Entry order
/// is unspecified; the planner imposes its own ordering.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Root the paths are relative to
    root: PathBuf,
    /// Relative path -> entry kind
    entries: AHashMap<PathBuf, EntryKind>,
}

impl Snapshot {
    /// Walk `root` and record every file, directory and symlink below it
    ///
    /// A root that does not exist produces an empty snapshot, which is what a
    /// replica looks like before the first run.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut entries = AHashMap::new();
        for entry in walk(root) {
            let entry = entry?;
            entries.insert(entry.rel_path, entry.kind);
        }

        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }

    /// Build a snapshot from explicit entries without touching the filesystem
    pub fn from_entries<I, P>(root: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = (P, EntryKind)>,
        P: Into<PathBuf>,
    {
        Self {
            root: root.into(),
            entries: entries.into_iter().map(|(p, k)| (p.into(), k)).collect(),
        }
    }

    /// Root directory of this snapshot
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Kind of the entry at `rel_path`, if present
    pub fn kind(&self, rel_path: &Path) -> Option<EntryKind> {
        self.entries.get(rel_path).copied()
    }

    /// Whether `rel_path` is present
    pub fn contains(&self, rel_path: &Path) -> bool {
        self.entries.contains_key(rel_path)
    }

    /// Absolute path of a relative entry path under this root
    pub fn abs_path(&self, rel_path: &Path) -> PathBuf {
        self.root.join(rel_path)
    }

    /// Relative paths in unspecified order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// (relative path, kind) pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&Path, EntryKind)> {
        self.entries.iter().map(|(p, k)| (p.as_path(), *k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
