//! Content digests used as the deduplication key.
//!
//! A digest is the lowercase hex SHA-256 of the raw uploaded bytes.
//! [`ContentHasher`] accumulates the bytes and the digest in one pass so a
//! non-seekable stream never has to be read twice.

use sha2::{Digest, Sha256};

/// Single-pass accumulator producing both the payload and its digest.
#[derive(Default)]
pub struct ContentHasher {
    hasher: Sha256,
    buf: Vec<u8>,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes consumed so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the complete payload and its hex digest.
    pub fn finish(self) -> (Vec<u8>, String) {
        (self.buf, hex::encode(self.hasher.finalize()))
    }
}

/// Hex SHA-256 of a complete buffer.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            content_digest(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_chunked_matches_whole() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(300);
        let mut hasher = ContentHasher::new();
        for chunk in data.chunks(97) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), data.len());
        let (bytes, digest) = hasher.finish();
        assert_eq!(bytes, data);
        assert_eq!(digest, content_digest(&data));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_empty_stream() {
        let hasher = ContentHasher::new();
        assert!(hasher.is_empty());
        let (bytes, digest) = hasher.finish();
        assert!(bytes.is_empty());
        assert_eq!(digest, content_digest(b""));
    }
}
