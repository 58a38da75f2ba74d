//! Error taxonomy shared by the mirror crates

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Errors raised while scanning, hashing or configuring a mirror
///
/// Per-mutation failures during plan execution are not represented here;
/// the executor records them in its report and keeps going.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// A required root directory does not exist
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// A root exists but is not a directory
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A file could not be read while computing its digest
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory traversal failed below a root
    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Any other filesystem failure tied to a path
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration values are out of range or inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("failed to parse config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },
}

impl MirrorError {
    /// Wrap an I/O error with the path it happened at
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error should stop the sync loop
    ///
    /// Only the origin root disappearing (or turning into a file) is fatal.
    /// Everything else is retried on the next polling interval.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PathNotFound(_) | Self::NotADirectory(_))
    }
}
