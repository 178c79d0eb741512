use md5::{Digest, Md5};

/// Prefix shared by all flow identifiers issued by this backend.
pub const FLOW_IDENTIFIER_PREFIX: &str = "rclone-vault-flow";

/// Derives the stable per-file flow identifier from the backend root and the
/// source's remote path.
///
/// The identifier correlates all chunks of one logical upload server-side,
/// so it must be bit-identical across runs and process boundaries. It is
/// derived from metadata rather than content: hashing file contents became a
/// bottleneck for large batches, and the (root, remote) pair is already
/// unique within a deposit.
pub fn derive_flow_identifier(root: &str, remote: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(root.as_bytes());
    hasher.update(remote.as_bytes());
    format!("{}-{}", FLOW_IDENTIFIER_PREFIX, hex::encode(hasher.finalize()))
}

/// Number of chunks required to upload an object of `size` bytes.
///
/// A zero-byte file still yields one (empty) chunk; the server requires at
/// least one chunk per registered file.
pub fn total_chunks(size: i64, chunk_size: i64) -> i64 {
    match size {
        0 => 1,
        _ => (size + chunk_size - 1) / chunk_size,
    }
}
