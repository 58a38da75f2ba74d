//! Independent convergence check between origin and replica
//!
//! Shares no state with the planner: both trees are rescanned and every
//! common file is rehashed, so planner bugs, executor failures and external
//! writers all show up as divergence.

use mirror_core::{hash_file, EntryKind, Snapshot};
use std::path::Path;
use tracing::debug;

/// True when the replica has exactly the origin's entries and file contents
///
/// Origin symlinks are not mirrored and are ignored here as well. Any scan or
/// read failure counts as divergence.
pub fn converged(origin_root: &Path, replica_root: &Path) -> bool {
    let (origin, replica) = match (Snapshot::scan(origin_root), Snapshot::scan(replica_root)) {
        (Ok(o), Ok(r)) => (o, r),
        (Err(e), _) | (_, Err(e)) => {
            debug!("Convergence scan failed: {}", e);
            return false;
        }
    };

    let mirrored = origin
        .iter()
        .filter(|(_, kind)| *kind != EntryKind::Symlink)
        .count();
    if mirrored != replica.len() {
        debug!(
            "Entry count differs: origin {}, replica {}",
            mirrored,
            replica.len()
        );
        return false;
    }

    for (path, kind) in origin.iter() {
        if kind == EntryKind::Symlink {
            continue;
        }
        if replica.kind(path) != Some(kind) {
            debug!("Entry differs: {}", path.display());
            return false;
        }
        if kind == EntryKind::File && !same_content(&origin.abs_path(path), &replica.abs_path(path)) {
            debug!("Content differs: {}", path.display());
            return false;
        }
    }

    true
}

fn same_content(a: &Path, b: &Path) -> bool {
    match (hash_file(a), hash_file(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
