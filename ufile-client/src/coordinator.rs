//! Parallel chunked downloads
//!
//! A [`TransferJob`] is planned into parts, every part runs as a
//! [`DownloadWorker`] on a [`BoundedPool`], and the results are joined into a
//! single [`ArtifactDescriptor`]. A failing part never stops its siblings;
//! all failures are reported together once the batch has drained.

use crate::config::{DEFAULT_BUFFER_SIZE, DEFAULT_CONCURRENCY};
use crate::planner::{plan, PartSpec, DEFAULT_PART_SIZE};
use crate::pool::BoundedPool;
use crate::progress::{ProgressAggregator, ProgressCallback, ProgressConfig};
use crate::sink::Sink;
use crate::worker::{DownloadWorker, PartFailure, RangeSource};
use crate::{ClientError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use ufile_core::ETag;
use ufile_net::{ErrorBody, HttpRequest, Transport};

/// Everything needed to run one download
pub struct TransferJob {
    /// Bytes to transfer, after range resolution
    pub total_size: u64,
    pub part_size: u32,
    pub concurrency: usize,
    pub buffer_size: usize,
    pub source: RangeSource,
    pub sink: Arc<dyn Sink>,
    pub progress: ProgressConfig,
    pub on_progress: Option<ProgressCallback>,
}

impl TransferJob {
    pub fn new(total_size: u64, source: RangeSource, sink: Arc<dyn Sink>) -> Self {
        TransferJob {
            total_size,
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            source,
            sink,
            progress: ProgressConfig::default(),
            on_progress: None,
        }
    }

    pub fn part_count(&self) -> Result<u32> {
        Ok(plan(self.total_size, self.part_size)?.len() as u32)
    }
}

/// Result of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub etag: ETag,
    pub size_on_disk: u64,
    /// Destination file, absent for in-memory sinks
    pub path: Option<PathBuf>,
}

/// Receives the outcome of a background download
pub trait DownloadCallback: Send + Sync {
    fn on_progress(&self, _bytes_written: u64, _total: u64) {}

    fn on_response(&self, artifact: ArtifactDescriptor);

    /// `request` is the request the failure belongs to when one is known
    fn on_error(&self, request: Option<&HttpRequest>, error: &ClientError, body: Option<&ErrorBody>);
}

/// Runs transfer jobs against a shared transport
#[derive(Clone)]
pub struct ParallelTransferCoordinator {
    transport: Arc<dyn Transport>,
}

impl ParallelTransferCoordinator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        ParallelTransferCoordinator { transport }
    }

    /// Download every part of `job` and block until all of them finished
    pub fn execute(&self, job: TransferJob) -> Result<ArtifactDescriptor> {
        let parts = Self::validate(&job)?;
        self.run(job, parts)
    }

    fn validate(job: &TransferJob) -> Result<Vec<PartSpec>> {
        if job.concurrency == 0 {
            return Err(ClientError::validation("concurrency must be at least 1"));
        }
        if job.buffer_size == 0 {
            return Err(ClientError::validation("buffer size must be greater than zero"));
        }
        plan(job.total_size, job.part_size)
    }

    fn run(&self, job: TransferJob, parts: Vec<PartSpec>) -> Result<ArtifactDescriptor> {
        info!(
            url = %job.source.url,
            total = job.total_size,
            parts = parts.len(),
            concurrency = job.concurrency,
            "starting download"
        );

        let progress = ProgressAggregator::new(job.total_size, job.progress, job.on_progress.clone());
        let _guard = progress.guard();
        progress.start();

        let transport: &dyn Transport = self.transport.as_ref();
        let worker = DownloadWorker {
            transport,
            source: &job.source,
            sink: job.sink.as_ref(),
            progress: &progress,
            buffer_size: job.buffer_size,
        };

        let outcomes = BoundedPool::new(job.concurrency).run(parts, |part| worker.run(part));

        let mut failures: Vec<PartFailure> = Vec::new();
        let mut transferred = 0u64;
        for outcome in outcomes {
            match outcome {
                Ok(part) => transferred += part.bytes_transferred,
                Err(failure) => {
                    warn!(part = failure.index, error = %failure.error, "part failed");
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            error!(failed = failures.len(), "download failed");
            return Err(ClientError::AggregateTransfer { failures });
        }

        job.sink.flush()?;
        progress.finish();

        let etag = job.sink.etag()?;
        let size_on_disk = job.sink.len()?;
        debug!(transferred, size_on_disk, "all parts written");
        info!(etag = %etag, size = size_on_disk, "download complete");

        Ok(ArtifactDescriptor {
            etag,
            size_on_disk,
            path: job.sink.path().map(Path::to_path_buf),
        })
    }

    /// Run `job` on a background thread and report through `callback`
    pub fn execute_async(
        &self,
        job: TransferJob,
        callback: Arc<dyn DownloadCallback>,
    ) -> Result<JoinHandle<()>> {
        let coordinator = self.clone();
        let handle = thread::Builder::new()
            .name("ufile-download".to_string())
            .spawn(move || coordinator.execute_with_callback(job, callback))?;
        Ok(handle)
    }

    /// Failures found before any request is sent reach `on_error` without a request
    pub(crate) fn execute_with_callback(&self, mut job: TransferJob, callback: Arc<dyn DownloadCallback>) {
        let parts = match Self::validate(&job) {
            Ok(parts) => parts,
            Err(e) => return callback.on_error(None, &e, e.error_body()),
        };

        let request = job.source.request();
        if job.on_progress.is_none() {
            let progress = Arc::clone(&callback);
            job.on_progress = Some(Arc::new(move |written, total| progress.on_progress(written, total)));
        }

        match self.run(job, parts) {
            Ok(artifact) => callback.on_response(artifact),
            Err(e) => callback.on_error(Some(&request), &e, e.error_body()),
        }
    }
}

/// Make sure `dir` exists and pick the file to write: an existing file is
/// removed when `overwrite` is set, otherwise `-1`, `-2`, … is appended to
/// the name until it is free
pub fn prepare_destination(dir: &Path, name: &str, overwrite: bool) -> Result<PathBuf> {
    if dir.exists() && !dir.is_dir() {
        return Err(ClientError::validation(format!(
            "{} exists and is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;

    let target = dir.join(name);
    if !target.exists() {
        return Ok(target);
    }

    if overwrite {
        if target.is_dir() {
            return Err(ClientError::validation(format!(
                "{} is a directory",
                target.display()
            )));
        }
        fs::remove_file(&target)?;
        return Ok(target);
    }

    for i in 1u32.. {
        let mut candidate = target.clone().into_os_string();
        candidate.push(format!("-{}", i));
        let candidate = PathBuf::from(candidate);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ClientError::validation(format!(
        "no free name next to {}",
        target.display()
    )))
}
