//! Object storage client

use crate::config::{DownloadConfig, DownloadOptions, ListOptions, ObjectConfig};
use crate::context::{RequestContext, JSON_CONTENT_TYPE};
use crate::coordinator::{
    prepare_destination, ArtifactDescriptor, DownloadCallback, ParallelTransferCoordinator,
    TransferJob,
};
use crate::multipart::MultipartUploadSession;
use crate::planner::resolve_range;
use crate::response::{check_status, NoContent, ObjectHeaders, UploadHit};
use crate::sink::FileSink;
use crate::streaming::ObjectStream;
use crate::worker::RangeSource;
use crate::{ClientError, Result};
use bytes::Bytes;
use chrono::Utc;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use ufile_core::auth::{ObjectAuthParam, ObjectAuthorizer};
use ufile_core::{
    BucketName, ETag, KeyName, MultipartCompletion, MultipartInfo, ObjectListing, ObjectProfile,
    PutObjectResult,
};
use ufile_net::{append_query, ErrorBody, HttpRequest, HyperTransport, Method, Transport, STATUS_OK};

const STATUS_NOT_FOUND: u16 = 404;

/// Client for the object APIs and the parallel download engine
#[derive(Clone)]
pub struct Client {
    context: RequestContext,
    coordinator: ParallelTransferCoordinator,
}

fn validate_names(bucket: &str, key: &str) -> Result<(BucketName, KeyName)> {
    let bucket = BucketName::new(bucket).map_err(|e| ClientError::validation(e.to_string()))?;
    let key = KeyName::new(key).map_err(|e| ClientError::validation(e.to_string()))?;
    Ok((bucket, key))
}

fn validate_bucket(bucket: &str) -> Result<BucketName> {
    BucketName::new(bucket).map_err(|e| ClientError::validation(e.to_string()))
}

impl Client {
    pub fn new(
        transport: Arc<dyn Transport>,
        authorizer: Arc<dyn ObjectAuthorizer>,
        config: ObjectConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Client {
            coordinator: ParallelTransferCoordinator::new(Arc::clone(&transport)),
            context: RequestContext {
                transport,
                authorizer,
                config,
            },
        })
    }

    /// Client over a default [`HyperTransport`]
    pub fn connect(authorizer: Arc<dyn ObjectAuthorizer>, config: ObjectConfig) -> Result<Self> {
        let transport = HyperTransport::new()?;
        Self::new(Arc::new(transport), authorizer, config)
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.context.config
    }

    /// `HEAD` the object
    pub fn object_profile(&self, bucket: &str, key: &str) -> Result<ObjectProfile> {
        let (bucket_name, key_name) = validate_names(bucket, key)?;
        let request = self.context.signed(
            Method::Head,
            self.context.object_url(bucket, key),
            bucket,
            key,
            "",
        )?;

        let headers: ObjectHeaders = self.context.send(request).map_err(|e| match e {
            ClientError::Http { status: STATUS_NOT_FOUND, body } => {
                let mut body = body.unwrap_or(ErrorBody {
                    ret_code: 0,
                    err_msg: String::new(),
                    session_id: None,
                });
                if body.err_msg.is_empty() {
                    body.err_msg = format!("object {}/{} does not exist", bucket, key);
                }
                ClientError::Http {
                    status: STATUS_NOT_FOUND,
                    body: Some(body),
                }
            }
            other => other,
        })?;

        Ok(ObjectProfile {
            bucket: bucket_name,
            key: key_name,
            content_length: headers.content_length,
            content_type: headers.content_type,
            etag: headers.etag,
            accept_ranges: headers.accept_ranges,
            last_modified: headers.last_modified,
        })
    }

    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mime_type: &str,
        data: impl Into<Bytes>,
    ) -> Result<PutObjectResult> {
        validate_names(bucket, key)?;
        let data = data.into();
        debug!(bucket, key, bytes = data.len(), "put object");

        let request = self
            .context
            .signed(Method::Put, self.context.object_url(bucket, key), bucket, key, mime_type)?
            .body(data);
        self.context.send(request)
    }

    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        validate_names(bucket, key)?;
        let request = self.context.signed(
            Method::Delete,
            self.context.object_url(bucket, key),
            bucket,
            key,
            "",
        )?;
        self.context.send::<NoContent>(request)?;
        Ok(())
    }

    /// One page of objects; follow [`ObjectListing::next_marker`] for more
    pub fn list_objects(&self, bucket: &str, options: &ListOptions) -> Result<ObjectListing> {
        validate_bucket(bucket)?;
        let limit = options.limit.map(|l| l.to_string());
        let mut params = vec![("list", "")];
        if let Some(prefix) = &options.prefix {
            params.push(("prefix", prefix.as_str()));
        }
        if let Some(marker) = &options.marker {
            params.push(("marker", marker.as_str()));
        }
        if let Some(limit) = &limit {
            params.push(("limit", limit.as_str()));
        }

        let url = append_query(&self.context.object_url(bucket, ""), &params);
        let request = self
            .context
            .signed(Method::Get, url, bucket, "", JSON_CONTENT_TYPE)?;
        self.context.send(request)
    }

    /// Ask the service whether identical content already exists and, if so,
    /// store it under `key` without uploading. The whole input is read into
    /// memory first.
    pub fn upload_hit<R: Read>(&self, bucket: &str, key: &str, mut reader: R) -> Result<UploadHit> {
        validate_names(bucket, key)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let etag = ETag::from_bytes(&data);
        self.send_upload_hit(bucket, key, &etag, data.len() as u64)
    }

    pub fn upload_hit_file(&self, bucket: &str, key: &str, path: impl AsRef<Path>) -> Result<UploadHit> {
        validate_names(bucket, key)?;
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let etag = ETag::from_file(path)?;
        self.send_upload_hit(bucket, key, &etag, size)
    }

    fn send_upload_hit(&self, bucket: &str, key: &str, etag: &ETag, size: u64) -> Result<UploadHit> {
        let size = size.to_string();
        let url = append_query(
            &format!("{}uploadhit", self.context.object_url(bucket, "")),
            &[("Hash", etag.as_str()), ("FileName", key), ("FileSize", size.as_str())],
        );
        let request = self.context.signed(Method::Post, url, bucket, key, "")?;
        let hit: UploadHit = self.context.send(request)?;
        debug!(bucket, key, ?hit, "upload hit");
        Ok(hit)
    }

    /// Unsigned URL of an object in a public bucket
    pub fn public_url(&self, bucket: &str, key: &str) -> Result<String> {
        validate_names(bucket, key)?;
        Ok(self.context.object_url(bucket, key))
    }

    /// Presigned `GET` URL valid for `expires`
    pub fn private_url(&self, bucket: &str, key: &str, expires: Duration) -> Result<String> {
        validate_names(bucket, key)?;
        let secs = i64::try_from(expires.as_secs())
            .map_err(|_| ClientError::validation("expiry is too far in the future"))?;
        let expires_at = Utc::now()
            .timestamp()
            .checked_add(secs)
            .ok_or_else(|| ClientError::validation("expiry is too far in the future"))?
            .to_string();

        let param = ObjectAuthParam::new(Method::Get.as_str(), bucket, key).with_date(&expires_at);
        let signature = self.context.authorizer.private_url_signature(&param)?;

        Ok(append_query(
            &self.context.object_url(bucket, key),
            &[
                ("UCloudPublicKey", self.context.authorizer.public_key()),
                ("Signature", signature.as_str()),
                ("Expires", expires_at.as_str()),
            ],
        ))
    }

    /// Whether the local file has the same ETag as the remote object
    pub fn compare_etag(&self, path: impl AsRef<Path>, bucket: &str, key: &str) -> Result<bool> {
        let local = ETag::from_file(path)?;
        let profile = self.object_profile(bucket, key)?;
        Ok(local.matches(&profile.etag))
    }

    /// Start a multipart upload
    pub fn init_multipart(&self, bucket: &str, key: &str, mime_type: &str) -> Result<MultipartUploadSession> {
        validate_names(bucket, key)?;
        let session = MultipartUploadSession::new(self.context.clone(), bucket, key, mime_type);
        session.initialize()?;
        Ok(session)
    }

    /// Continue an upload started by [`Client::init_multipart`]
    pub fn resume_multipart(&self, info: MultipartInfo) -> MultipartUploadSession {
        MultipartUploadSession::resume(self.context.clone(), info)
    }

    /// Upload ordered part buffers and finish, aborting on any part failure
    pub fn upload_multipart<P>(
        &self,
        info: MultipartInfo,
        parts: Vec<P>,
        concurrency: usize,
    ) -> Result<MultipartCompletion>
    where
        P: AsRef<[u8]> + Send,
    {
        self.resume_multipart(info).upload_all(parts, concurrency)
    }

    /// Whole-object `GET` as a stream
    pub fn get_stream(&self, url: &str) -> Result<ObjectStream> {
        let response = self.context.transport.send(HttpRequest::new(Method::Get, url))?;
        let response = check_status(response, &[STATUS_OK])?;
        Ok(ObjectStream::from_response(response))
    }

    /// Download `object_size` bytes behind `url` (or the configured range)
    /// into `options.save_dir`
    pub fn download_range(
        &self,
        url: &str,
        object_size: u64,
        options: DownloadOptions,
    ) -> Result<ArtifactDescriptor> {
        let config = DownloadConfig::new(options)?;
        let job = self.download_job(url, object_size, &config)?;
        self.coordinator.execute(job)
    }

    /// Download an object through a presigned URL
    pub fn download_file(
        &self,
        profile: &ObjectProfile,
        options: DownloadOptions,
    ) -> Result<ArtifactDescriptor> {
        let config = DownloadConfig::new(options)?;
        let url = self.profile_url(profile, &config)?;
        let job = self.download_job(&url, profile.content_length, &config)?;
        self.coordinator.execute(job)
    }

    /// [`Client::download_range`] on a background thread
    pub fn download_range_async(
        &self,
        url: &str,
        object_size: u64,
        options: DownloadOptions,
        callback: Arc<dyn DownloadCallback>,
    ) -> Result<JoinHandle<()>> {
        let client = self.clone();
        let url = url.to_string();
        self.spawn_download(callback, move |callback| {
            let job = DownloadConfig::new(options)
                .and_then(|config| client.download_job(&url, object_size, &config));
            client.run_job(job, callback)
        })
    }

    /// [`Client::download_file`] on a background thread
    pub fn download_file_async(
        &self,
        profile: &ObjectProfile,
        options: DownloadOptions,
        callback: Arc<dyn DownloadCallback>,
    ) -> Result<JoinHandle<()>> {
        let client = self.clone();
        let profile = profile.clone();
        self.spawn_download(callback, move |callback| {
            let job = DownloadConfig::new(options).and_then(|config| {
                let url = client.profile_url(&profile, &config)?;
                client.download_job(&url, profile.content_length, &config)
            });
            client.run_job(job, callback)
        })
    }

    fn spawn_download<F>(&self, callback: Arc<dyn DownloadCallback>, task: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(Arc<dyn DownloadCallback>) + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("ufile-download".to_string())
            .spawn(move || task(callback))?;
        Ok(handle)
    }

    fn run_job(&self, job: Result<TransferJob>, callback: Arc<dyn DownloadCallback>) {
        match job {
            Ok(job) => self.coordinator.execute_with_callback(job, callback),
            Err(e) => callback.on_error(None, &e, e.error_body()),
        }
    }

    fn profile_url(&self, profile: &ObjectProfile, config: &DownloadConfig) -> Result<String> {
        if !profile.supports_ranges() {
            warn!(
                key = %profile.key,
                accept_ranges = %profile.accept_ranges,
                "object does not advertise byte ranges"
            );
        }
        self.private_url(profile.bucket.as_str(), profile.key.as_str(), config.url_expiry())
    }

    /// Resolve the range, prepare the destination and describe the transfer
    fn download_job(&self, url: &str, object_size: u64, config: &DownloadConfig) -> Result<TransferJob> {
        let (offset, size) = match config.range() {
            Some((offset, size)) => (Some(offset), Some(size)),
            None => (None, None),
        };
        let range = resolve_range(object_size, offset, size)?;

        let path = prepare_destination(config.save_dir(), config.save_name(), config.overwrite())?;
        let sink = FileSink::create(&path)?;

        let mut source = RangeSource::new(url);
        source.remote_offset = range.offset;
        source.object_size = Some(object_size);

        let mut job = TransferJob::new(range.length, source, Arc::new(sink));
        job.part_size = config.part_size();
        job.concurrency = config.concurrency();
        job.buffer_size = config.buffer_size();
        job.progress = config.progress();
        Ok(job)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.context.config)
            .finish_non_exhaustive()
    }
}
