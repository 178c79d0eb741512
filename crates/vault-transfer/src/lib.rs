//! Chunked, resumable upload primitives for the Vault backend.
//!
//! The upload protocol splits every file into fixed-size, 1-indexed chunks
//! that are correlated server-side by a stable flow identifier. This crate
//! provides the pieces the uploader composes: the [`Chunker`], flow
//! identifier derivation, a rolling [`MultiHasher`], a capped Fibonacci
//! [`backoff`] iterator and temp-file spooling for sources of unknown size.

mod backoff;
mod chunker;
mod flow;
mod hash;
mod progress;
mod spool;

pub use backoff::Fibonacci;
pub use chunker::{ChunkReader, Chunker};
pub use flow::{derive_flow_identifier, total_chunks, FLOW_IDENTIFIER_PREFIX};
pub use hash::{Digests, MultiHasher};
pub use progress::SpeedCalculator;
pub use spool::spool_to_temp;

/// Default upload chunk size: 1 MiB.
///
/// Throughput roughly triples with 16 MiB chunks, but larger chunks have
/// triggered premature deposit completion on some servers, so the default
/// stays conservative and is tunable via configuration.
pub const DEFAULT_CHUNK_SIZE: i64 = 1 << 20;

/// Errors produced by the transfer primitives.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid chunk size (must be positive)")]
    InvalidChunkSize,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
