//! Content hashing used as the analysis-cache key.

use blake3::Hasher as Blake3Hasher;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Computes content hashes for cache-key purposes.
pub struct Hasher;

impl Hasher {
    /// Generate a BLAKE3 hash of file contents.
    ///
    /// Uses streaming to handle large files efficiently without loading
    /// the entire file into memory. Two bit-identical files always share a
    /// cache entry; a single-pixel edit always produces a fresh one.
    pub fn content_hash(path: &Path) -> std::io::Result<String> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Blake3Hasher::new();

        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_content_hash_is_deterministic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"same bytes").unwrap();

        let hash1 = Hasher::content_hash(file.path()).unwrap();
        let hash2 = Hasher::content_hash(file.path()).unwrap();
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_content_hash_differs_for_different_bytes() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"alpha").unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        b.write_all(b"beta").unwrap();

        assert_ne!(
            Hasher::content_hash(a.path()).unwrap(),
            Hasher::content_hash(b.path()).unwrap()
        );
    }
}
