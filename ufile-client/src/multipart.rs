//! Multipart upload sessions
//!
//! A session moves `Created → Initialized → PartsInFlight → Finished` or
//! ends in `Aborted`. Parts can be uploaded from many threads at once; the
//! session records one fragment ETag per part index and joins them in index
//! order when the upload is finished.

use crate::context::{RequestContext, JSON_CONTENT_TYPE};
use crate::pool::BoundedPool;
use crate::response::NoContent;
use crate::worker::{self, PartFailure, PartResult};
use crate::{ClientError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use ufile_core::{MultipartCompletion, MultipartInfo, PartState};
use ufile_net::{append_query, Method};

/// Lifecycle of a multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    Initialized,
    PartsInFlight,
    Finished,
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Finished | SessionPhase::Aborted)
    }
}

struct SessionState {
    phase: SessionPhase,
    info: Option<MultipartInfo>,
    parts: Vec<PartState>,
}

/// One multipart upload against one object key
pub struct MultipartUploadSession {
    context: RequestContext,
    bucket: String,
    key: String,
    mime_type: String,
    state: Mutex<SessionState>,
}

impl MultipartUploadSession {
    pub(crate) fn new(context: RequestContext, bucket: &str, key: &str, mime_type: &str) -> Self {
        MultipartUploadSession {
            context,
            bucket: bucket.to_string(),
            key: key.to_string(),
            mime_type: mime_type.to_string(),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Created,
                info: None,
                parts: Vec::new(),
            }),
        }
    }

    /// Re-attach to an upload that was initialized earlier
    pub(crate) fn resume(context: RequestContext, info: MultipartInfo) -> Self {
        let session = Self::new(context, &info.bucket, &info.key, &info.mime_type);
        {
            let mut state = session.state.lock();
            state.phase = SessionPhase::Initialized;
            state.info = Some(info);
        }
        session
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    pub fn info(&self) -> Option<MultipartInfo> {
        self.state.lock().info.clone()
    }

    /// Uploaded parts in index order
    pub fn parts(&self) -> Vec<PartState> {
        let mut parts = self.state.lock().parts.clone();
        parts.sort_by_key(|p| p.index);
        parts
    }

    /// Largest part the service accepts, once initialized
    pub fn part_size(&self) -> Option<u32> {
        self.state.lock().info.as_ref().map(|info| info.blk_size)
    }

    fn object_url(&self, params: &[(&str, &str)]) -> String {
        append_query(&self.context.object_url(&self.bucket, &self.key), params)
    }

    /// `POST {key}?uploads`
    pub fn initialize(&self) -> Result<MultipartInfo> {
        let mut state = self.state.lock();
        if state.phase != SessionPhase::Created {
            return Err(ClientError::InvalidState(format!(
                "cannot initialize a session in phase {:?}",
                state.phase
            )));
        }

        let request = self.context.signed(
            Method::Post,
            self.object_url(&[("uploads", "")]),
            &self.bucket,
            &self.key,
            &self.mime_type,
        )?;
        let mut info: MultipartInfo = self.context.send(request)?;
        info.mime_type = self.mime_type.clone();
        if info.bucket.is_empty() {
            info.bucket = self.bucket.clone();
        }
        if info.key.is_empty() {
            info.key = self.key.clone();
        }

        info!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %info.upload_id,
            part_size = info.blk_size,
            "multipart upload initialized"
        );
        state.phase = SessionPhase::Initialized;
        state.info = Some(info.clone());
        Ok(info)
    }

    /// `PUT {key}?uploadId=..&partNumber=index`; a repeated index replaces
    /// the earlier fragment
    pub fn upload_part(&self, index: u32, data: &[u8]) -> Result<PartResult> {
        let info = {
            let state = self.state.lock();
            match state.phase {
                SessionPhase::Initialized | SessionPhase::PartsInFlight => {}
                phase => {
                    return Err(ClientError::InvalidState(format!(
                        "cannot upload a part in phase {:?}",
                        phase
                    )))
                }
            }
            state
                .info
                .clone()
                .ok_or_else(|| ClientError::InvalidState("session has no upload id".to_string()))?
        };

        if data.len() as u64 > u64::from(info.blk_size) {
            return Err(ClientError::validation(format!(
                "part {} is {} bytes, larger than the block size {}",
                index,
                data.len(),
                info.blk_size
            )));
        }

        let part_number = index.to_string();
        let url = self.object_url(&[
            ("uploadId", info.upload_id.as_str()),
            ("partNumber", part_number.as_str()),
        ]);
        let request = self
            .context
            .signed(
                Method::Put,
                url,
                &self.bucket,
                &self.key,
                &self.mime_type,
            )?
            .body(Bytes::copy_from_slice(data));

        let result = worker::upload_part(self.context.transport.as_ref(), index, request)?;
        let etag = result.etag.clone().unwrap_or_default();

        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            return Err(ClientError::InvalidState(format!(
                "session reached {:?} while part {} was in flight",
                state.phase, index
            )));
        }
        match state.parts.iter_mut().find(|p| p.index == index) {
            Some(existing) => existing.etag = etag,
            None => state.parts.push(PartState { index, etag }),
        }
        state.phase = SessionPhase::PartsInFlight;
        debug!(part = index, parts = state.parts.len(), "part recorded");

        Ok(result)
    }

    /// Join the recorded parts into the final object, optionally under
    /// `new_key`; a failed attempt can be retried
    pub fn finish(&self, new_key: Option<&str>) -> Result<MultipartCompletion> {
        let mut state = self.state.lock();
        if state.phase != SessionPhase::PartsInFlight {
            return Err(ClientError::InvalidState(format!(
                "cannot finish a session in phase {:?}",
                state.phase
            )));
        }
        let upload_id = match &state.info {
            Some(info) => info.upload_id.clone(),
            None => return Err(ClientError::InvalidState("session has no upload id".to_string())),
        };

        state.parts.sort_by_key(|p| p.index);
        let body = state
            .parts
            .iter()
            .map(|p| p.etag.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut params = vec![("uploadId", upload_id.as_str())];
        if let Some(new_key) = new_key {
            params.push(("newKey", new_key));
        }
        let request = self
            .context
            .signed(
                Method::Post,
                self.object_url(&params),
                &self.bucket,
                &self.key,
                &self.mime_type,
            )?
            .body(body);

        let mut completion: MultipartCompletion = self.context.send(request)?;
        if completion.bucket.is_empty() {
            completion.bucket = self.bucket.clone();
        }
        if completion.key.is_empty() {
            completion.key = new_key.unwrap_or(&self.key).to_string();
        }

        info!(
            key = %completion.key,
            parts = state.parts.len(),
            size = completion.file_size,
            "multipart upload finished"
        );
        state.phase = SessionPhase::Finished;
        Ok(completion)
    }

    /// `DELETE {key}?uploadId=..`; recorded parts are discarded
    pub fn abort(&self) -> Result<()> {
        let mut state = self.state.lock();
        let upload_id = match (state.phase, &state.info) {
            (SessionPhase::Initialized | SessionPhase::PartsInFlight, Some(info)) => {
                info.upload_id.clone()
            }
            (phase, _) => {
                return Err(ClientError::InvalidState(format!(
                    "cannot abort a session in phase {:?}",
                    phase
                )))
            }
        };

        let request = self.context.signed(
            Method::Delete,
            self.object_url(&[("uploadId", upload_id.as_str())]),
            &self.bucket,
            &self.key,
            JSON_CONTENT_TYPE,
        )?;
        self.context.send::<NoContent>(request)?;

        info!(upload_id = %upload_id, discarded = state.parts.len(), "multipart upload aborted");
        state.parts.clear();
        state.phase = SessionPhase::Aborted;
        Ok(())
    }

    /// Upload `parts` in order on `concurrency` threads and finish; any part
    /// failure aborts the session and returns every failed part
    pub fn upload_all<P>(&self, parts: Vec<P>, concurrency: usize) -> Result<MultipartCompletion>
    where
        P: AsRef<[u8]> + Send,
    {
        if concurrency == 0 {
            return Err(ClientError::validation("concurrency must be at least 1"));
        }

        let indexed = parts.into_iter().enumerate().map(|(i, data)| (i as u32, data));
        let outcomes = BoundedPool::new(concurrency).run(indexed, |(index, data)| {
            self.upload_part(index, data.as_ref())
                .map_err(|error| PartFailure { index, error })
        });

        let mut failures: Vec<PartFailure> = outcomes.into_iter().filter_map(|o| o.err()).collect();
        if failures.is_empty() {
            return self.finish(None);
        }

        failures.sort_by_key(|f| f.index);
        for failure in &failures {
            warn!(part = failure.index, error = %failure.error, "part upload failed");
        }
        if let Err(e) = self.abort() {
            warn!(error = %e, "abort after failed parts did not succeed");
        }
        Err(ClientError::AggregateTransfer { failures })
    }
}

impl std::fmt::Debug for MultipartUploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartUploadSession")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
