//! Error types for the UFile core layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UFileError {
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
