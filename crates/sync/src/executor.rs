//! Applying a sync plan to the replica
//!
//! Deletions run first, in plan order, then creations. A failure on one
//! mutation is recorded and logged, and the rest of the plan still runs; the
//! next polling iteration re-diffs and retries whatever was left behind.

use mirror_core::{walk, EntryKind, SyncPlan};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Kind of replica mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateDir,
    CopyFile,
    DeleteFile,
    DeleteDir,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MutationKind::CreateDir => "create directory",
            MutationKind::CopyFile => "copy file",
            MutationKind::DeleteFile => "delete file",
            MutationKind::DeleteDir => "delete directory",
        };
        f.write_str(s)
    }
}

/// A mutation that could not be applied
#[derive(Debug)]
pub struct MutationFailure {
    pub kind: MutationKind,
    /// Absolute path the mutation targeted
    pub path: PathBuf,
    pub error: io::Error,
}

/// Outcome of applying one plan
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub created_dirs: usize,
    pub copied_files: usize,
    /// Files removed, including those inside removed directories
    pub deleted_files: usize,
    /// Directories removed, including nested ones
    pub deleted_dirs: usize,
    /// Plan entries that were already satisfied or whose source vanished
    pub skipped: usize,
    pub failures: Vec<MutationFailure>,
}

impl ExecutionReport {
    /// Number of mutations actually performed
    pub fn applied(&self) -> usize {
        self.created_dirs + self.copied_files + self.deleted_files + self.deleted_dirs
    }

    /// True when no mutation failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, kind: MutationKind, path: &Path, error: io::Error) {
        warn!("Failed to {} \"{}\": {}", kind, path.display(), error);
        self.failures.push(MutationFailure {
            kind,
            path: path.to_path_buf(),
            error,
        });
    }
}

/// Apply `plan` to `replica_root`, copying content from `origin_root`
///
/// The replica root is created first when missing. Never returns an error:
/// every per-entry failure ends up in the report instead.
pub fn execute(plan: &SyncPlan, origin_root: &Path, replica_root: &Path) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    if !replica_root.is_dir() {
        if let Err(e) = fs::create_dir_all(replica_root) {
            report.fail(MutationKind::CreateDir, replica_root, e);
            return report;
        }
        info!("Create directory \"{}\"", replica_root.display());
        report.created_dirs += 1;
    }

    for rel in &plan.deletions {
        delete_entry(&replica_root.join(rel), &mut report);
    }

    for rel in &plan.creations {
        create_entry(&origin_root.join(rel), &replica_root.join(rel), &mut report);
    }

    debug!(
        "Applied {} mutation(s), skipped {}, failed {}",
        report.applied(),
        report.skipped,
        report.failures.len()
    );
    report
}

fn delete_entry(target: &Path, report: &mut ExecutionReport) {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // Already gone, usually with a parent removed earlier in the plan
            debug!("Nothing to delete at \"{}\"", target.display());
            report.skipped += 1;
            return;
        }
        Err(e) => {
            report.fail(MutationKind::DeleteFile, target, e);
            return;
        }
    };

    if meta.file_type().is_symlink() {
        match fs::remove_file(target).or_else(|_| fs::remove_dir(target)) {
            Ok(()) => {
                log_file_deleted(target);
                report.deleted_files += 1;
            }
            Err(e) => report.fail(MutationKind::DeleteFile, target, e),
        }
    } else if meta.is_dir() {
        delete_dir_tree(target, report);
    } else {
        let result = clear_readonly(target, &meta).and_then(|_| fs::remove_file(target));
        match result {
            Ok(()) => {
                log_file_deleted(target);
                report.deleted_files += 1;
            }
            Err(e) => report.fail(MutationKind::DeleteFile, target, e),
        }
    }
}

/// Remove a directory and everything below it, logging each removed entry
fn delete_dir_tree(dir: &Path, report: &mut ExecutionReport) {
    // Listed up front so the log reflects what was actually removed
    let nested: Vec<_> = walk(dir).filter_map(|entry| entry.ok()).collect();

    // Read-only directories would block removal of their children
    for entry in nested.iter().filter(|e| e.kind == EntryKind::Dir) {
        let path = dir.join(&entry.rel_path);
        if let Ok(meta) = fs::symlink_metadata(&path) {
            let _ = clear_readonly(&path, &meta);
        }
    }
    if let Ok(meta) = fs::symlink_metadata(dir) {
        let _ = clear_readonly(dir, &meta);
    }

    if let Err(e) = fs::remove_dir_all(dir) {
        report.fail(MutationKind::DeleteDir, dir, e);
        return;
    }

    for entry in nested.iter().rev() {
        let path = dir.join(&entry.rel_path);
        match entry.kind {
            EntryKind::Dir => {
                info!("Delete directory \"{}\"", path.display());
                report.deleted_dirs += 1;
            }
            EntryKind::File | EntryKind::Symlink => {
                log_file_deleted(&path);
                report.deleted_files += 1;
            }
        }
    }
    info!("Delete directory \"{}\"", dir.display());
    report.deleted_dirs += 1;
}

fn create_entry(source: &Path, target: &Path, report: &mut ExecutionReport) {
    let meta = match fs::symlink_metadata(source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Source \"{}\" vanished before it could be copied", source.display());
            report.skipped += 1;
            return;
        }
        Err(e) => {
            report.fail(MutationKind::CopyFile, target, e);
            return;
        }
    };

    if meta.is_dir() {
        match fs::create_dir(target) {
            Ok(()) => {
                info!("Create directory \"{}\"", target.display());
                report.created_dirs += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && target.is_dir() => {
                report.skipped += 1;
            }
            Err(e) => report.fail(MutationKind::CreateDir, target, e),
        }
    } else if meta.is_file() {
        match fs::copy(source, target) {
            Ok(_) => {
                info!(
                    "File \"{}\" copied from \"{}\" to \"{}\"",
                    file_name(source),
                    parent_display(source),
                    parent_display(target)
                );
                report.copied_files += 1;
            }
            Err(e) => report.fail(MutationKind::CopyFile, target, e),
        }
    } else {
        // Turned into a symlink (or something stranger) since the scan
        debug!("Not mirroring \"{}\": not a regular file or directory", source.display());
        report.skipped += 1;
    }
}

fn log_file_deleted(path: &Path) {
    info!(
        "Delete file \"{}\" from \"{}\"",
        file_name(path),
        parent_display(path)
    );
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

/// Give the owner write permission so removal is not blocked by it
fn clear_readonly(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
    }

    fs::set_permissions(path, perms)
}
