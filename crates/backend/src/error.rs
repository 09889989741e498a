use thiserror::Error;

/// Errors surfaced by [`crate::BackendClient`] implementations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}
