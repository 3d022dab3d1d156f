use thiserror::Error;

/// Error vocabulary surfaced by the observation store and the consistent
/// proto store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("observation exceeds max_bytes_per_observation")]
    ObservationTooBig,

    #[error("store is full")]
    StoreFull,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("not found")]
    NotFound,

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("data loss: {0}")]
    DataLoss(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::WriteFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.to_string())
    }
}
