//! Session transport and typed REST client for the Vault digital
//! preservation archive.
//!
//! The archive speaks a browser-style protocol: a form login that yields a
//! session cookie, an anti-forgery token that must accompany every
//! state-changing request, and a JSON REST API over tree nodes, collections
//! and deposits. [`Session`] owns the cookie jar and the token dance;
//! [`VaultApi`] layers the typed operations on top.

mod cache;
mod client;
mod error;
mod session;
mod types;

pub use cache::Cache;
pub use client::{ChunkMeta, VaultApi};
pub use error::ApiError;
pub use session::{Session, DEFAULT_TIMEOUT, UPLOAD_CHUNK_TIMEOUT};
pub use types::{
    Collection, CollectionStats, DepositFile, DepositStatus, Geolocation, ListResponse, NodeType,
    Organization, Plan, RegisterDepositRequest, TreeNode, User,
};

/// Response header carrying the server's API version.
pub const VERSION_HEADER: &str = "X-Vault-API-Version";

/// API version this client implements.
pub const VERSION_SUPPORTED: &str = "2";

/// User-Agent sent with every request, identifying the tool and the
/// supported API version.
pub fn user_agent() -> String {
    format!(
        "rclone-vault/{} (vault-api v{})",
        env!("CARGO_PKG_VERSION"),
        VERSION_SUPPORTED
    )
}
