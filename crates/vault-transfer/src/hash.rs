use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hex-encoded digests of one uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

/// Accumulates MD5, SHA-1 and SHA-256 over a byte stream.
///
/// The uploader tees every chunk through this before it goes on the wire,
/// so a successful put returns the digests of exactly the bytes sent.
#[derive(Default)]
pub struct MultiHasher {
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
}

impl MultiHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `data` into all three hashers.
    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
    }

    /// Consumes the hasher and returns the hex digests.
    pub fn finalize(self) -> Digests {
        Digests {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
        }
    }
}
