//! UFile object storage client SDK
//!
//! The [`Client`] wraps the object APIs. Large downloads go through the
//! [`ParallelTransferCoordinator`], which splits an object into parts,
//! fetches them concurrently with HTTP range requests and writes them into a
//! [`Sink`] with positioned writes. Multipart uploads are driven by a
//! [`MultipartUploadSession`].

pub mod client;
pub mod config;
mod context;
pub mod coordinator;
pub mod error;
pub mod multipart;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod response;
pub mod sink;
pub mod streaming;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::Client;
pub use config::{DownloadConfig, DownloadOptions, ListOptions, ObjectConfig};
pub use coordinator::{
    prepare_destination, ArtifactDescriptor, DownloadCallback, ParallelTransferCoordinator,
    TransferJob,
};
pub use error::ClientError;
pub use multipart::{MultipartUploadSession, SessionPhase};
pub use planner::{plan, resolve_range, ByteRange, PartSpec};
pub use pool::BoundedPool;
pub use progress::{ProgressAggregator, ProgressCallback, ProgressConfig};
pub use response::UploadHit;
pub use sink::{FileSink, MemorySink, Sink};
pub use streaming::ObjectStream;
pub use worker::{PartFailure, PartResult, RangeSource};

pub type Result<T> = std::result::Result<T, ClientError>;
