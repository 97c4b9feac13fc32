//! HTTP plumbing for the UFile SDK
//!
//! The transfer engine talks to the network only through the blocking
//! [`Transport`] trait. [`HyperTransport`] is the default implementation.

use bytes::Bytes;
use std::io::Read;
use std::sync::Arc;

pub mod hyper_transport;
pub mod protocol;

pub use hyper_transport::*;
pub use protocol::*;

/// Transport level failures
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Body error: {0}")]
    Body(String),

    #[error("Invalid Content-Range: {0}")]
    ContentRange(String),
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, NetError>;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request with a fully buffered body
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response with a streaming body
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Read + Send + 'static) -> Self {
        HttpResponse {
            status,
            headers,
            body: Box::new(body),
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_mut(&mut self) -> &mut (dyn Read + Send) {
        self.body.as_mut()
    }

    /// Drain the body into memory
    pub fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .map_err(|e| NetError::Body(e.to_string()))?;
        Ok(buf)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Blocking HTTP transport; one call per request, safe to share across threads
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_headers_are_case_insensitive() {
        let req = HttpRequest::new(Method::Get, "http://b.r.example.com/k")
            .header("Range", "bytes=0-9")
            .header("Date", "20240101000000");

        assert_eq!(req.header_value("range"), Some("bytes=0-9"));
        assert_eq!(req.header_value("DATE"), Some("20240101000000"));
        assert_eq!(req.header_value("authorization"), None);
        assert!(req.body.is_empty());
    }

    #[test]
    fn response_body_drains() {
        let resp = HttpResponse::new(
            206,
            vec![("content-range".to_string(), "bytes 0-2/3".to_string())],
            Cursor::new(b"abc".to_vec()),
        );

        assert!(resp.is_success());
        assert_eq!(resp.header("Content-Range"), Some("bytes 0-2/3"));
        assert_eq!(resp.read_to_vec().unwrap(), b"abc");
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Head.as_str(), "HEAD");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
