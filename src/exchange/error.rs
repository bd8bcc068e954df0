//! Errors raised by the REST client before they are collapsed to "no data".

/// Convenience alias for client results.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure of a single REST call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connection, proxy, or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The exchange answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the JSON shape we expected.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// True for timeouts, which are logged less loudly than other failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_timeout())
    }
}
