//! Vault digital preservation archive as a remote filesystem backend.
//!
//! Exposes the archive's ORGANIZATION → COLLECTION → FOLDER → FILE tree as
//! a generic remote filesystem: list, stat, upload, mkdir, rename, move,
//! delete. Uploads honor the archive's ingestion contract — files arrive as
//! chunked, resumable streams grouped under a server-registered deposit
//! that is explicitly finalized on shutdown (or terminated on abnormal
//! exit).
//!
//! [`VaultFs`] is the entry point; one instance per configured remote.

mod config;
mod error;
mod fs;
mod pathutil;
mod resolver;
mod uploader;

pub use config::VaultConfig;
pub use error::BackendError;
pub use fs::{DirEntry, Directory, SourceInfo, Usage, VaultFs, VaultObject};
pub use pathutil::is_valid_path;
pub use uploader::{run_termination_watch, DepositUploader, TerminationWatch, UploadedObject};
