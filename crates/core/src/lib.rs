//! Core of the directory mirror
//!
//! This crate provides:
//! - BLAKE3 content digests for change detection
//! - A lazy tree walk shared by every component that traverses a root
//! - Immutable snapshots of a tree's shape
//! - The diff planner producing ordered deletion/creation lists
//! - An optional size+mtime digest cache

pub mod cache;
pub mod error;
pub mod hash;
pub mod plan;
pub mod snapshot;
pub mod walk;

// Re-exports
pub use cache::DigestCache;
pub use error::{MirrorError, Result};
pub use hash::{hash_bytes, hash_file, ContentDigest};
pub use plan::{plan, DigestSource, DirectHasher, SyncPlan};
pub use snapshot::Snapshot;
pub use walk::{walk, EntryKind, TreeWalk, WalkEntry};
