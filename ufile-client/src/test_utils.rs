//! Test doubles for exercising the transfer engine without a network

use std::io::Cursor;
use parking_lot::Mutex;
use ufile_net::{headers, HttpRequest, HttpResponse, NetError, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> ufile_net::Result<HttpResponse> + Send + Sync>;

/// In-memory [`Transport`] driven by a handler closure; records every request
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> ufile_net::Result<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        MockTransport {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve `data` as a single object honouring `Range` headers
    pub fn serving(data: Vec<u8>) -> Self {
        Self::new(move |req| range_response(&data, req))
    }

    /// Every request sent so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> ufile_net::Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        (self.handler)(&request)
    }
}

/// Parse `bytes=<start>-<end>` from a request
pub fn requested_range(req: &HttpRequest) -> Option<(u64, u64)> {
    let value = req.header_value(headers::RANGE)?.strip_prefix("bytes=")?;
    let (start, end) = value.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// 206 with the requested slice of `data`, or 200 with all of it
pub fn range_response(data: &[u8], req: &HttpRequest) -> ufile_net::Result<HttpResponse> {
    match requested_range(req) {
        Some((start, end)) => {
            if data.is_empty() {
                return Ok(status_response(416));
            }
            let end = end.min(data.len() as u64 - 1);
            if start > end {
                return Ok(status_response(416));
            }
            Ok(HttpResponse::new(
                206,
                vec![(
                    headers::CONTENT_RANGE.to_string(),
                    format!("bytes {}-{}/{}", start, end, data.len()),
                )],
                Cursor::new(data[start as usize..=end as usize].to_vec()),
            ))
        }
        None => Ok(HttpResponse::new(
            200,
            vec![(headers::CONTENT_LENGTH.to_string(), data.len().to_string())],
            Cursor::new(data.to_vec()),
        )),
    }
}

/// Empty-bodied response with `status`
pub fn status_response(status: u16) -> HttpResponse {
    HttpResponse::new(status, Vec::new(), std::io::empty())
}

/// Service error response with a JSON error body
pub fn error_response(status: u16, ret_code: i64, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "RetCode": ret_code, "ErrMsg": message }).to_string();
    HttpResponse::new(
        status,
        vec![(headers::SESSION_ID.to_string(), "mock-session".to_string())],
        Cursor::new(body.into_bytes()),
    )
}

/// 200 with a JSON body
pub fn json_response(value: serde_json::Value) -> HttpResponse {
    HttpResponse::new(
        200,
        vec![(headers::CONTENT_TYPE.to_string(), "application/json".to_string())],
        Cursor::new(value.to_string().into_bytes()),
    )
}

/// A transport failure as a handler result
pub fn connection_refused() -> ufile_net::Result<HttpResponse> {
    Err(NetError::Connection("connection refused".to_string()))
}

/// Deterministic test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Temporary directory for download destinations
pub fn temp() -> std::io::Result<tempfile::TempDir> {
    tempfile::tempdir()
}
