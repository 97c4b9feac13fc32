//! Blocking [`Transport`] on top of hyper
//!
//! The transport owns a tokio runtime. Callers stay on plain threads and
//! block on the runtime for each request; response bodies are pulled frame
//! by frame as the caller reads.

use crate::{HttpRequest, HttpResponse, Method, NetError, Result, Transport};
use bytes::{Buf, Bytes};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::io::{self, Read};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

/// Connection settings for [`HyperTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub worker_threads: usize,
    pub connect_timeout: Option<Duration>,
    /// Deadline for receiving response headers
    pub request_timeout: Option<Duration>,
    pub pool_idle_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            worker_threads: 2,
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: Some(Duration::from_secs(60)),
            pool_idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 32,
        }
    }
}

/// HTTP/1.1 transport with connection pooling
pub struct HyperTransport {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
    request_timeout: Option<Duration>,
}

impl HyperTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("ufile-net")
            .enable_all()
            .build()
            .map_err(|e| NetError::Connection(format!("failed to start runtime: {}", e)))?;

        let client = {
            let _guard = runtime.enter();
            let mut connector = HttpConnector::new();
            connector.set_connect_timeout(config.connect_timeout);
            connector.set_nodelay(true);

            Client::builder(TokioExecutor::new())
                .pool_timer(TokioTimer::new())
                .pool_idle_timeout(config.pool_idle_timeout)
                .pool_max_idle_per_host(config.max_idle_per_host)
                .build(connector)
        };

        Ok(HyperTransport {
            runtime,
            client,
            request_timeout: config.request_timeout,
        })
    }

    fn to_hyper(request: HttpRequest) -> Result<hyper::Request<Full<Bytes>>> {
        let uri: Uri = request
            .url
            .parse()
            .map_err(|e| NetError::InvalidRequest(format!("invalid url '{}': {}", request.url, e)))?;

        let method = match request.method {
            Method::Get => hyper::Method::GET,
            Method::Head => hyper::Method::HEAD,
            Method::Put => hyper::Method::PUT,
            Method::Post => hyper::Method::POST,
            Method::Delete => hyper::Method::DELETE,
        };

        let mut builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Full::new(request.body))
            .map_err(|e| NetError::InvalidRequest(e.to_string()))
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, body = request.body.len(), "sending request");

        let request = Self::to_hyper(request)?;
        let pending = self.client.request(request);

        let response = match self.request_timeout {
            Some(limit) => self
                .runtime
                .block_on(async { tokio::time::timeout(limit, pending).await })
                .map_err(|_| NetError::Connection(format!("no response within {:?}", limit)))?,
            None => self.runtime.block_on(pending),
        }
        .map_err(|e| NetError::Connection(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        debug!(status = parts.status.as_u16(), "response received");

        Ok(HttpResponse::new(
            parts.status.as_u16(),
            headers,
            IncomingReader::new(body, self.runtime.handle().clone()),
        ))
    }
}

/// Adapts a hyper body into a blocking [`Read`]
struct IncomingReader {
    body: Incoming,
    handle: Handle,
    pending: Bytes,
    done: bool,
}

impl IncomingReader {
    fn new(body: Incoming, handle: Handle) -> Self {
        IncomingReader {
            body,
            handle,
            pending: Bytes::new(),
            done: false,
        }
    }
}

impl Read for IncomingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            if self.done {
                return Ok(0);
            }
            match self.handle.block_on(self.body.frame()) {
                Some(Ok(frame)) => {
                    // Trailers carry no payload
                    if let Ok(data) = frame.into_data() {
                        self.pending = data;
                    }
                }
                Some(Err(e)) => return Err(io::Error::new(io::ErrorKind::Other, e)),
                None => self.done = true,
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}
