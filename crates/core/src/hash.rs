//! BLAKE3 content digests used to detect modified files

use crate::error::{MirrorError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read buffer size for streaming file hashes
const READ_BUF_SIZE: usize = 64 * 1024;

/// A BLAKE3 digest of a file's raw bytes (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Create a digest from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string; `None` on bad length or characters
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest::from_bytes(*blake3::hash(data).as_bytes())
}

/// Hash a file's full contents (streaming)
///
/// Fails with [`MirrorError::Read`] when the file is missing or unreadable,
/// which happens routinely when a file is removed between scan and hash.
pub fn hash_file(path: &Path) -> Result<ContentDigest> {
    let read_err = |source| MirrorError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = vec![0u8; READ_BUF_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(read_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentDigest::from_bytes(*hasher.finalize().as_bytes()))
}
