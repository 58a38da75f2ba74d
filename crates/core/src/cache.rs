//! Digest cache keyed by path, invalidated by size and modification time
//!
//! Avoids rehashing unchanged files on every polling pass. A file rewritten
//! with identical length inside the filesystem's timestamp granularity is not
//! noticed until its mtime moves, which is why the cache is opt-in.

use crate::error::{MirrorError, Result};
use crate::hash::{hash_file, ContentDigest};
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy)]
struct CachedDigest {
    len: u64,
    modified: SystemTime,
    digest: ContentDigest,
}

/// Path -> (size, mtime, digest) index
#[derive(Debug, Default)]
pub struct DigestCache {
    entries: AHashMap<PathBuf, CachedDigest>,
    hits: u64,
    misses: u64,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached digest if the file looks unchanged, else rehash
    pub fn get_or_hash(&mut self, path: &Path) -> Result<ContentDigest> {
        let metadata = std::fs::metadata(path).map_err(|source| {
            self.entries.remove(path);
            MirrorError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let len = metadata.len();
        let modified = metadata
            .modified()
            .map_err(|source| MirrorError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(cached) = self.entries.get(path) {
            if cached.len == len && cached.modified == modified {
                self.hits += 1;
                return Ok(cached.digest);
            }
        }

        self.misses += 1;
        let digest = match hash_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                self.entries.remove(path);
                return Err(e);
            }
        };
        self.entries.insert(
            path.to_path_buf(),
            CachedDigest {
                len,
                modified,
                digest,
            },
        );
        Ok(digest)
    }

    /// Drop entries whose path no longer satisfies `keep`
    pub fn prune(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
