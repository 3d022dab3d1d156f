use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}
