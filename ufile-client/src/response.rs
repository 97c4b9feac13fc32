//! Typed decoding of object API responses

use crate::{ClientError, Result};
use serde::de::DeserializeOwned;
use ufile_core::etag::strip_quotes;
use ufile_core::{MultipartCompletion, MultipartInfo, ObjectListing, PutObjectResult};
use ufile_net::{headers, ErrorBody, HttpResponse, STATUS_OK};

/// A response type that knows which statuses mean success and how to read
/// itself from the wire
pub trait DecodeResponse: Sized {
    const SUCCESS: &'static [u16] = &[STATUS_OK];

    fn decode(response: HttpResponse) -> Result<Self>;
}

/// Check the status against `T::SUCCESS` and decode
pub fn decode_response<T: DecodeResponse>(response: HttpResponse) -> Result<T> {
    let response = check_status(response, T::SUCCESS)?;
    T::decode(response)
}

/// Pass the response through when its status is accepted, otherwise turn it
/// into [`ClientError::Http`] with the decoded server error body
pub fn check_status(response: HttpResponse, accepted: &[u16]) -> Result<HttpResponse> {
    if accepted.contains(&response.status) {
        Ok(response)
    } else {
        Err(error_from_response(response))
    }
}

pub fn error_from_response(response: HttpResponse) -> ClientError {
    let status = response.status;
    let session = response.header(headers::SESSION_ID).map(str::to_string);
    // A body that cannot be read still leaves the status to report
    let body = response.read_to_vec().unwrap_or_default();
    ClientError::Http {
        status,
        body: ErrorBody::decode(&body, session.as_deref()),
    }
}

fn decode_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    let body = response.read_to_vec()?;
    serde_json::from_slice(&body)
        .map_err(|e| ClientError::InvalidResponse(format!("malformed JSON body: {}", e)))
}

fn etag_header(response: &HttpResponse) -> Option<String> {
    response
        .header(headers::ETAG)
        .map(|v| strip_quotes(v).to_string())
        .filter(|v| !v.is_empty())
}

/// Object headers returned by HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub content_length: u64,
    pub content_type: String,
    pub etag: String,
    pub accept_ranges: String,
    pub last_modified: String,
}

impl DecodeResponse for ObjectHeaders {
    fn decode(response: HttpResponse) -> Result<Self> {
        let header = |name: &str| response.header(name).unwrap_or_default().to_string();
        let content_length = match response.header(headers::CONTENT_LENGTH) {
            Some(v) => v.trim().parse().map_err(|_| {
                ClientError::InvalidResponse(format!("invalid Content-Length '{}'", v))
            })?,
            None => 0,
        };

        Ok(ObjectHeaders {
            content_length,
            content_type: header(headers::CONTENT_TYPE),
            etag: etag_header(&response).unwrap_or_default(),
            accept_ranges: header(headers::ACCEPT_RANGES),
            last_modified: header(headers::LAST_MODIFIED),
        })
    }
}

impl DecodeResponse for PutObjectResult {
    fn decode(response: HttpResponse) -> Result<Self> {
        let etag = etag_header(&response)
            .ok_or_else(|| ClientError::mismatch("PUT response carries no ETag"))?;
        Ok(PutObjectResult { etag })
    }
}

impl DecodeResponse for MultipartInfo {
    fn decode(response: HttpResponse) -> Result<Self> {
        let info: MultipartInfo = decode_json(response)?;
        if info.upload_id.is_empty() {
            return Err(ClientError::InvalidResponse("empty UploadId".to_string()));
        }
        if info.blk_size == 0 {
            return Err(ClientError::InvalidResponse("BlkSize is zero".to_string()));
        }
        Ok(info)
    }
}

impl DecodeResponse for MultipartCompletion {
    fn decode(response: HttpResponse) -> Result<Self> {
        let etag = etag_header(&response);
        let body = response.read_to_vec()?;
        let mut completion = if body.iter().all(u8::is_ascii_whitespace) {
            MultipartCompletion {
                bucket: String::new(),
                key: String::new(),
                file_size: 0,
                etag: None,
            }
        } else {
            serde_json::from_slice::<MultipartCompletion>(&body)
                .map_err(|e| ClientError::InvalidResponse(format!("malformed JSON body: {}", e)))?
        };
        completion.etag = etag;
        Ok(completion)
    }
}

impl DecodeResponse for ObjectListing {
    fn decode(response: HttpResponse) -> Result<Self> {
        decode_json(response)
    }
}

/// Success without a meaningful body (DELETE, abort)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoContent;

impl DecodeResponse for NoContent {
    const SUCCESS: &'static [u16] = &[200, 204];

    fn decode(_response: HttpResponse) -> Result<Self> {
        Ok(NoContent)
    }
}

/// Result of an upload-hit probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadHit {
    /// The service already stored identical content under the key
    Hit,
    /// The content must be uploaded normally
    Miss,
}

impl DecodeResponse for UploadHit {
    const SUCCESS: &'static [u16] = &[200, 404];

    fn decode(response: HttpResponse) -> Result<Self> {
        Ok(if response.status == STATUS_OK {
            UploadHit::Hit
        } else {
            UploadHit::Miss
        })
    }
}
