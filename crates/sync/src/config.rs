//! Sync configuration
//!
//! Roots and the polling interval come from the command line; the optional
//! TOML file carries tunables:
//!
//! ```toml
//! [sync]
//! interval_secs = 30          # overrides the command-line interval
//! digest_cache = true         # reuse digests of files whose size+mtime are unchanged
//! divergence_alert_after = 3  # escalate after N divergent iterations (0 = never)
//! ```

use mirror_core::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Shortest accepted polling interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default divergent-iteration streak before an error is logged
pub const DEFAULT_DIVERGENCE_ALERT_AFTER: u32 = 3;

/// Runtime configuration for one origin/replica pair
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Source-of-truth directory (never written)
    pub origin: PathBuf,
    /// Destination directory (created if absent)
    pub replica: PathBuf,
    /// Delay between the end of one iteration and the start of the next
    pub interval: Duration,
    /// Reuse digests of files whose size and mtime are unchanged
    pub digest_cache: bool,
    /// Consecutive divergent iterations before an error record (0 disables)
    pub divergence_alert_after: u32,
}

impl SyncConfig {
    /// Configuration with default tunables
    pub fn new(origin: impl Into<PathBuf>, replica: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            origin: origin.into(),
            replica: replica.into(),
            interval,
            digest_cache: false,
            divergence_alert_after: DEFAULT_DIVERGENCE_ALERT_AFTER,
        }
    }

    /// Overlay values from a config file
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(secs) = file.sync.interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(enabled) = file.sync.digest_cache {
            self.digest_cache = enabled;
        }
        if let Some(n) = file.sync.divergence_alert_after {
            self.divergence_alert_after = n;
        }
    }

    /// Make both roots absolute, then [`validate`](Self::validate)
    pub fn validated(mut self) -> Result<Self> {
        self.origin = absolutize(&self.origin)?;
        self.replica = absolutize(&self.replica)?;
        self.validate()?;
        Ok(self)
    }

    /// Check the configuration before entering the loop
    ///
    /// Fails with `PathNotFound` / `NotADirectory` for a bad origin and
    /// `InvalidConfig` for anything else. Roots are compared as given, so
    /// call [`validated`](Self::validated) for user-supplied paths.
    pub fn validate(&self) -> Result<()> {
        check_origin(&self.origin)?;

        if self.interval < MIN_INTERVAL {
            return Err(MirrorError::InvalidConfig(format!(
                "interval must be at least {}s, got {:?}",
                MIN_INTERVAL.as_secs(),
                self.interval
            )));
        }

        if self.replica.exists() && !self.replica.is_dir() {
            return Err(MirrorError::InvalidConfig(format!(
                "replica \"{}\" exists and is not a directory",
                self.replica.display()
            )));
        }

        if self.origin == self.replica {
            return Err(MirrorError::InvalidConfig(
                "origin and replica are the same directory".to_string(),
            ));
        }
        if self.replica.starts_with(&self.origin) {
            return Err(MirrorError::InvalidConfig(format!(
                "replica \"{}\" is inside origin \"{}\"",
                self.replica.display(),
                self.origin.display()
            )));
        }
        if self.origin.starts_with(&self.replica) {
            return Err(MirrorError::InvalidConfig(format!(
                "origin \"{}\" is inside replica \"{}\"",
                self.origin.display(),
                self.replica.display()
            )));
        }

        Ok(())
    }
}

/// Origin root must exist and be a directory
pub fn check_origin(origin: &Path) -> Result<()> {
    match std::fs::metadata(origin) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(MirrorError::NotADirectory(origin.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MirrorError::PathNotFound(origin.to_path_buf()))
        }
        Err(e) => Err(MirrorError::io(origin, e)),
    }
}

/// Absolute, symlink-free form of `path`, which need not exist yet
///
/// `.` and `..` are folded lexically first, then the deepest existing
/// ancestor is canonicalized and the missing tail appended.
fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| MirrorError::io(path, e))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = std::fs::canonicalize(existing).map_err(|e| MirrorError::io(existing, e))?;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub sync: SyncSection,
}

/// `[sync]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub interval_secs: Option<u64>,
    pub digest_cache: Option<bool>,
    pub divergence_alert_after: Option<u32>,
}

impl FileConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
        Self::parse(&text).map_err(|message| MirrorError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let origin = temp_dir.path().join("origin");
        fs::create_dir(&origin).unwrap();
        let replica = temp_dir.path().join("replica");
        (temp_dir, origin, replica)
    }

    #[test]
    fn test_valid_config() {
        let (_tmp, origin, replica) = dirs();
        let config = SyncConfig::new(origin, replica, Duration::from_secs(10))
            .validated()
            .unwrap();
        assert!(config.origin.is_absolute());
        assert!(config.replica.is_absolute());
        assert!(!config.digest_cache);
        assert_eq!(config.divergence_alert_after, DEFAULT_DIVERGENCE_ALERT_AFTER);
    }

    #[test]
    fn test_missing_origin_is_path_not_found() {
        let (tmp, _origin, replica) = dirs();
        let result = SyncConfig::new(tmp.path().join("nope"), replica, Duration::from_secs(10))
            .validated();
        assert!(matches!(result, Err(MirrorError::PathNotFound(_))));
    }

    #[test]
    fn test_origin_file_is_not_a_directory() {
        let (tmp, _origin, replica) = dirs();
        let file = tmp.path().join("file");
        fs::write(&file, b"x").unwrap();
        let result = SyncConfig::new(file, replica, Duration::from_secs(10)).validated();
        assert!(matches!(result, Err(MirrorError::NotADirectory(_))));
    }

    #[test]
    fn test_interval_bounds() {
        let (_tmp, origin, replica) = dirs();
        let too_short = SyncConfig::new(&origin, &replica, Duration::ZERO).validated();
        assert!(matches!(too_short, Err(MirrorError::InvalidConfig(_))));

        let sub_second = SyncConfig::new(&origin, &replica, Duration::from_millis(500)).validated();
        assert!(matches!(sub_second, Err(MirrorError::InvalidConfig(_))));

        let long = SyncConfig::new(&origin, &replica, Duration::from_secs(30 * 86_400)).validated();
        assert!(long.is_ok());

        let huge = SyncConfig::new(&origin, &replica, Duration::from_secs(u64::MAX)).validated();
        assert!(huge.is_ok());
    }

    #[test]
    fn test_nested_roots_rejected() {
        let (_tmp, origin, replica) = dirs();

        let inside = SyncConfig::new(&origin, origin.join("copy"), Duration::from_secs(5)).validated();
        assert!(matches!(inside, Err(MirrorError::InvalidConfig(_))));

        let same = SyncConfig::new(&origin, &origin, Duration::from_secs(5)).validated();
        assert!(matches!(same, Err(MirrorError::InvalidConfig(_))));

        fs::create_dir(&replica).unwrap();
        let nested_origin = replica.join("src");
        fs::create_dir(&nested_origin).unwrap();
        let outer = SyncConfig::new(&nested_origin, &replica, Duration::from_secs(5)).validated();
        assert!(matches!(outer, Err(MirrorError::InvalidConfig(_))));
    }

    #[test]
    fn test_dotdot_in_missing_replica_tail() {
        let (tmp, origin, _replica) = dirs();
        let sneaky = tmp.path().join("new/../origin/inner");
        let result = SyncConfig::new(&origin, sneaky, Duration::from_secs(5)).validated();
        assert!(matches!(result, Err(MirrorError::InvalidConfig(_))));
    }

    #[test]
    fn test_replica_must_not_be_a_file() {
        let (_tmp, origin, replica) = dirs();
        fs::write(&replica, b"x").unwrap();
        let result = SyncConfig::new(&origin, &replica, Duration::from_secs(5)).validated();
        assert!(matches!(result, Err(MirrorError::InvalidConfig(_))));
    }

    #[test]
    fn test_file_config_overlay() {
        let (tmp, origin, replica) = dirs();
        let path = tmp.path().join("mirror.toml");
        fs::write(
            &path,
            "[sync]\ninterval_secs = 30\ndigest_cache = true\ndivergence_alert_after = 0\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        let mut config = SyncConfig::new(origin, replica, Duration::from_secs(5));
        config.apply_file(&file);

        assert_eq!(config.interval, Duration::from_secs(30));
        assert!(config.digest_cache);
        assert_eq!(config.divergence_alert_after, 0);
    }

    #[test]
    fn test_empty_file_config_changes_nothing() {
        let file = FileConfig::parse("").unwrap();
        let mut config = SyncConfig::new("/o", "/r", Duration::from_secs(7));
        config.apply_file(&file);
        assert_eq!(config.interval, Duration::from_secs(7));
        assert!(!config.digest_cache);
    }

    #[test]
    fn test_malformed_file_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[sync]\ndigest_cache = \"yes please\"\n").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(MirrorError::ConfigParse { .. })
        ));
    }
}
