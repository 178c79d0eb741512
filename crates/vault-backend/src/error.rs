//! Backend error types.

use vault_api::ApiError;
use vault_transfer::TransferError;

/// Errors surfaced by the filesystem façade and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("object not found")]
    ObjectNotFound,

    #[error("directory not found")]
    DirNotFound,

    #[error("is a directory")]
    IsDir,

    #[error("copying files to root is not supported in vault")]
    CannotCreateAtRoot,

    #[error("missing deposit identifier")]
    MissingDepositIdentifier,

    #[error("path already exists: {0}")]
    PathAlreadyExists(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Maps a 404 on a read-only lookup to the not-found sentinel; other
    /// API errors pass through.
    pub(crate) fn from_lookup(err: ApiError) -> Self {
        match err {
            ApiError::Api { status: 404, .. } => BackendError::ObjectNotFound,
            other => BackendError::Api(other),
        }
    }
}
