//! Core data models and types for the UFile SDK

pub mod auth;
pub mod error;
pub mod etag;
pub mod types;

pub use error::*;
pub use etag::{ETag, ETagHasher, ETAG_BLOCK_SIZE};
pub use types::*;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, UFileError>;
