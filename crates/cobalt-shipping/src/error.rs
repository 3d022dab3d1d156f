use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}
