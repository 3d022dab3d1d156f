//! Encoder error vocabulary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Other(String),
}
