//! Content fingerprinting.
//!
//! Files are streamed through BLAKE3 in fixed-size chunks, so memory use does
//! not depend on file size. The 256-bit digest is what duplicate detection
//! and cross-volume copy verification compare.

use crate::error::HashError;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size used while hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, 64 characters long.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

/// Computes content fingerprints.
pub struct ContentHasher;

impl ContentHasher {
    /// Fingerprints the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `HashError::Io` if the file cannot be opened or a read fails
    /// part way through (for example if it was deleted or its permissions
    /// changed during the scan).
    pub fn fingerprint(path: &Path) -> Result<Fingerprint, HashError> {
        let file = File::open(path).map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::fingerprint_reader(file).map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Fingerprints everything readable from `reader`.
    pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(Fingerprint(*hasher.finalize().as_bytes()))
    }

    /// Fingerprints an in-memory buffer.
    pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
        Fingerprint(*blake3::hash(data).as_bytes())
    }
}
