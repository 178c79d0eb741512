//! API error types.

/// Errors produced by the transport and the typed client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint URL")]
    InvalidEndpoint,

    #[error("missing CSRF token")]
    MissingCsrfToken,

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("api version mismatch: server {server}, supported {supported}")]
    VersionMismatch { server: String, supported: String },

    #[error("unsupported filter key: {0}")]
    UnsupportedFilter(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("ambiguous query: expected at most one result, got {0}")]
    AmbiguousQuery(usize),
}

impl ApiError {
    /// Whether the chunk-upload retry loop may retry after this error.
    ///
    /// Transport failures (DNS, TLS, resets) and server-side 5xx responses
    /// are retryable; 4xx responses are not, since they usually mean the
    /// deposit closed early server-side.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
