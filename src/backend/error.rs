use thiserror::Error;

/// Errors returned by a [`SearchBackend`](super::SearchBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            detail: detail.into(),
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
