use thiserror::Error;

/// Failures talking to the movie catalog API.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("catalog returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    /// The response body was not the JSON shape we expect.
    #[error("catalog response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Rejected user input; state is left untouched.
    #[error("{0}")]
    Validation(String),

    #[error("stored value for '{key}' is corrupt: {source}")]
    PersistenceRead {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist '{key}': {source}")]
    PersistenceWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
