//! Backend configuration.

use serde::{Deserialize, Serialize};

use vault_transfer::DEFAULT_CHUNK_SIZE;

/// Recognized options for a Vault remote.
///
/// `max_parallel_uploads` and `max_parallel_chunks` are advisory hints for
/// the host tool's scheduler; the core always sends chunks of one object
/// serially and in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Vault username.
    pub username: String,
    /// Vault password.
    pub password: String,
    /// Vault API endpoint URL (trailing slash tolerated).
    pub endpoint: String,
    /// Upload chunk size in bytes.
    pub chunk_size: i64,
    /// If non-zero, reuse this deposit instead of registering a new one.
    pub resume_deposit_id: i64,
    /// Advisory upper bound for concurrent per-object transfers.
    pub max_parallel_uploads: usize,
    /// Advisory upper bound for in-flight chunks.
    pub max_parallel_chunks: usize,
    /// Disables host-tool progress reporting only.
    pub suppress_progress_bar: bool,
    /// Skips the first-chunk MIME sniff.
    pub skip_content_type_detection: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            endpoint: "http://127.0.0.1:8000/api".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            resume_deposit_id: 0,
            max_parallel_uploads: 1,
            max_parallel_chunks: 1,
            suppress_progress_bar: false,
            skip_content_type_detection: false,
        }
    }
}

impl VaultConfig {
    /// Endpoint without a trailing slash.
    pub fn endpoint_normalized(&self) -> String {
        self.endpoint.trim_end_matches('/').to_string()
    }
}
