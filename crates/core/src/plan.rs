//! Diffing two snapshots into an ordered mutation plan
//!
//! The ordering of the plan is what makes it safe to apply naively:
//! deletions run deepest-first so a directory is only removed after the
//! entries below it, and creations run parents-first so a file's directory
//! always exists before the file is copied.

use crate::cache::DigestCache;
use crate::error::Result;
use crate::hash::{hash_file, ContentDigest};
use crate::snapshot::Snapshot;
use crate::walk::EntryKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Access to file digests during planning
pub trait DigestSource {
    /// Digest of the file at `path` (absolute)
    fn digest(&mut self, path: &Path) -> Result<ContentDigest>;
}

/// Hashes every file on request, no caching
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectHasher;

impl DigestSource for DirectHasher {
    fn digest(&mut self, path: &Path) -> Result<ContentDigest> {
        hash_file(path)
    }
}

impl DigestSource for DigestCache {
    fn digest(&mut self, path: &Path) -> Result<ContentDigest> {
        self.get_or_hash(path)
    }
}

/// Ordered replica mutations for one iteration
///
/// `deletions` is sorted descending and `creations` ascending. A path may sit
/// in both lists when its replica copy is stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Replica-relative paths to remove, children before parents
    pub deletions: Vec<PathBuf>,
    /// Origin-relative paths to create or copy, parents before children
    pub creations: Vec<PathBuf>,
}

impl SyncPlan {
    /// True when the trees already match
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.creations.is_empty()
    }

    /// Total number of mutations
    pub fn len(&self) -> usize {
        self.deletions.len() + self.creations.len()
    }
}

/// Compute the plan that turns `replica` into a copy of `origin`
///
/// Paths present on both sides are compared by kind and, for files, by
/// digest; a difference schedules delete-then-recreate. One-sided paths are
/// unconditionally deleted or created. Origin symlinks are left out of the
/// plan entirely, so a replica symlink never matches anything and is always
/// removed.
pub fn plan(origin: &Snapshot, replica: &Snapshot, digests: &mut dyn DigestSource) -> SyncPlan {
    let mut deletions = Vec::new();
    let mut creations = Vec::new();
    let mut skipped_links = 0usize;

    for (path, origin_kind) in origin.iter() {
        if origin_kind == EntryKind::Symlink {
            debug!("Not mirroring symbolic link {}", path.display());
            skipped_links += 1;
            continue;
        }

        match replica.kind(path) {
            None => creations.push(path.to_path_buf()),
            Some(replica_kind) => {
                if !entries_match(origin, replica, path, origin_kind, replica_kind, digests) {
                    deletions.push(path.to_path_buf());
                    creations.push(path.to_path_buf());
                }
            }
        }
    }

    for path in replica.paths() {
        let mirrored = matches!(origin.kind(path), Some(kind) if kind != EntryKind::Symlink);
        if !mirrored {
            deletions.push(path.to_path_buf());
        }
    }

    if skipped_links > 0 {
        warn!(
            "Skipping {} symbolic link(s) in \"{}\" (links are not mirrored)",
            skipped_links,
            origin.root().display()
        );
    }

    deletions.sort_by(|a, b| b.cmp(a));
    creations.sort();

    SyncPlan {
        deletions,
        creations,
    }
}

fn entries_match(
    origin: &Snapshot,
    replica: &Snapshot,
    path: &Path,
    origin_kind: EntryKind,
    replica_kind: EntryKind,
    digests: &mut dyn DigestSource,
) -> bool {
    match (origin_kind, replica_kind) {
        (EntryKind::Dir, EntryKind::Dir) => true,
        (EntryKind::File, EntryKind::File) => {
            let origin_digest = digests.digest(&origin.abs_path(path));
            let replica_digest = digests.digest(&replica.abs_path(path));
            match (origin_digest, replica_digest) {
                (Ok(a), Ok(b)) => a == b,
                (Err(e), _) | (_, Err(e)) => {
                    // Unreadable counts as absent: recreate and let the
                    // executor report it if the origin copy is really gone.
                    debug!("Treating {} as changed: {}", path.display(), e);
                    false
                }
            }
        }
        _ => false,
    }
}
