//! Single-part transfers

use crate::planner::PartSpec;
use crate::progress::ProgressAggregator;
use crate::response::error_from_response;
use crate::sink::Sink;
use crate::{ClientError, Result};
use std::io::ErrorKind;
use tracing::debug;
use ufile_core::etag::strip_quotes;
use ufile_net::{
    format_range, headers, ContentRange, HttpRequest, Method, Transport, STATUS_OK,
    STATUS_PARTIAL_CONTENT,
};

/// Outcome of a successful part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    pub index: u32,
    pub bytes_transferred: u64,
    /// Fragment ETag of an uploaded part
    pub etag: Option<String>,
}

/// A part that failed, with the reason
#[derive(Debug)]
pub struct PartFailure {
    pub index: u32,
    pub error: ClientError,
}

pub type PartOutcome = std::result::Result<PartResult, PartFailure>;

/// Remote object a download reads from
#[derive(Debug, Clone)]
pub struct RangeSource {
    pub url: String,
    /// Extra headers sent with every part request
    pub headers: Vec<(String, String)>,
    /// Remote position of relative offset 0
    pub remote_offset: u64,
    /// Full object size, checked against `Content-Range` totals
    pub object_size: Option<u64>,
}

impl RangeSource {
    pub fn new(url: impl Into<String>) -> Self {
        RangeSource {
            url: url.into(),
            headers: Vec::new(),
            remote_offset: 0,
            object_size: None,
        }
    }

    /// The request for the whole source, without a range
    pub fn request(&self) -> HttpRequest {
        self.headers
            .iter()
            .fold(HttpRequest::new(Method::Get, self.url.clone()), |req, (k, v)| {
                req.header(k, v.clone())
            })
    }
}

/// Downloads one part into a sink with positioned writes
pub struct DownloadWorker<'a> {
    pub transport: &'a dyn Transport,
    pub source: &'a RangeSource,
    pub sink: &'a dyn Sink,
    pub progress: &'a ProgressAggregator,
    pub buffer_size: usize,
}

impl DownloadWorker<'_> {
    pub fn run(&self, part: PartSpec) -> PartOutcome {
        self.transfer(part)
            .map_err(|error| PartFailure { index: part.index, error })
    }

    fn transfer(&self, part: PartSpec) -> Result<PartResult> {
        let remote_start = self.source.remote_offset + part.start;
        let remote_end = self.source.remote_offset + part.end;

        let request = self
            .source
            .request()
            .header(headers::RANGE, format_range(remote_start, remote_end));
        debug!(part = part.index, start = remote_start, end = remote_end, "requesting part");

        let mut response = self.transport.send(request)?;
        if response.status != STATUS_PARTIAL_CONTENT {
            return Err(error_from_response(response));
        }

        let header = response
            .header(headers::CONTENT_RANGE)
            .ok_or_else(|| ClientError::mismatch(format!("part {} has no Content-Range", part.index)))?;
        let range = ContentRange::parse(header).map_err(|e| ClientError::mismatch(e.to_string()))?;

        if range.start != remote_start {
            return Err(ClientError::mismatch(format!(
                "part {} starts at {} but {} was requested",
                part.index, range.start, remote_start
            )));
        }
        if let (Some(expected), Some(total)) = (self.source.object_size, range.total) {
            if expected != total {
                return Err(ClientError::mismatch(format!(
                    "object size changed from {} to {}",
                    expected, total
                )));
            }
        }

        let expected = part.len();
        let mut buf = vec![0u8; self.buffer_size.max(1)];
        let mut consumed = 0u64;
        let body = response.body_mut();

        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if consumed + n as u64 > expected {
                return Err(ClientError::mismatch(format!(
                    "part {} body is longer than {} bytes",
                    part.index, expected
                )));
            }

            self.sink.write_at(part.start + consumed, &buf[..n])?;
            consumed += n as u64;
            self.progress.record_write(n as u64);
        }

        if consumed < expected {
            return Err(ClientError::mismatch(format!(
                "part {} body ended after {} of {} bytes",
                part.index, consumed, expected
            )));
        }

        debug!(part = part.index, bytes = consumed, "part complete");
        Ok(PartResult {
            index: part.index,
            bytes_transferred: consumed,
            etag: None,
        })
    }
}

/// Send one prepared part upload and return its fragment ETag
pub fn upload_part(transport: &dyn Transport, index: u32, request: HttpRequest) -> Result<PartResult> {
    let bytes = request.body.len() as u64;
    debug!(part = index, bytes, "uploading part");

    let response = transport.send(request)?;
    if response.status != STATUS_OK {
        return Err(error_from_response(response));
    }

    let etag = response
        .header(headers::ETAG)
        .map(|v| strip_quotes(v).to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ClientError::mismatch(format!("part {} response carries no ETag", index)))?;

    Ok(PartResult {
        index,
        bytes_transferred: bytes,
        etag: Some(etag),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::test_utils::MockTransport;
    use ufile_net::HttpResponse;

    fn object() -> Vec<u8> {
        (0..100u8).collect()
    }

    fn run_part(transport: &MockTransport, part: PartSpec, source: &RangeSource) -> (PartOutcome, MemorySink) {
        let sink = MemorySink::new();
        let progress = ProgressAggregator::silent(100);
        let worker = DownloadWorker {
            transport,
            source,
            sink: &sink,
            progress: &progress,
            buffer_size: 7,
        };
        (worker.run(part), sink)
    }

    #[test]
    fn writes_part_at_relative_offset() {
        let transport = MockTransport::serving(object());
        let mut source = RangeSource::new("http://b.r.example.com/k");
        source.remote_offset = 10;
        source.object_size = Some(100);

        let part = PartSpec { index: 1, start: 20, end: 29 };
        let (outcome, sink) = run_part(&transport, part, &source);

        let result = outcome.unwrap();
        assert_eq!(result.bytes_transferred, 10);

        let data = sink.snapshot();
        assert_eq!(&data[20..30], &object()[30..40]);

        let requests = transport.requests();
        assert_eq!(requests[0].header_value("Range"), Some("bytes=30-39"));
    }

    #[test]
    fn non_partial_status_is_http_error() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::new(200, vec![], std::io::Cursor::new(object())))
        });
        let source = RangeSource::new("http://h/k");
        let (outcome, _) = run_part(&transport, PartSpec { index: 0, start: 0, end: 9 }, &source);

        let failure = outcome.unwrap_err();
        assert_eq!(failure.index, 0);
        assert!(matches!(failure.error, ClientError::Http { status: 200, .. }));
    }

    #[test]
    fn wrong_start_is_a_mismatch() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::new(
                206,
                vec![("Content-Range".to_string(), "bytes 5-14/100".to_string())],
                std::io::Cursor::new(vec![0u8; 10]),
            ))
        });
        let source = RangeSource::new("http://h/k");
        let (outcome, _) = run_part(&transport, PartSpec { index: 0, start: 0, end: 9 }, &source);
        assert!(matches!(outcome.unwrap_err().error, ClientError::ProtocolMismatch(_)));
    }

    #[test]
    fn changed_total_is_a_mismatch() {
        let transport = MockTransport::serving(object());
        let mut source = RangeSource::new("http://h/k");
        source.object_size = Some(99);

        let (outcome, _) = run_part(&transport, PartSpec { index: 0, start: 0, end: 9 }, &source);
        assert!(matches!(outcome.unwrap_err().error, ClientError::ProtocolMismatch(_)));
    }

    #[test]
    fn short_and_long_bodies_are_mismatches() {
        for len in [5usize, 15] {
            let transport = MockTransport::new(move |_| {
                Ok(HttpResponse::new(
                    206,
                    vec![("Content-Range".to_string(), "bytes 0-9/100".to_string())],
                    std::io::Cursor::new(vec![1u8; len]),
                ))
            });
            let source = RangeSource::new("http://h/k");
            let (outcome, _) =
                run_part(&transport, PartSpec { index: 0, start: 0, end: 9 }, &source);
            assert!(matches!(outcome.unwrap_err().error, ClientError::ProtocolMismatch(_)));
        }
    }

    #[test]
    fn missing_content_range_is_a_mismatch() {
        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::new(206, vec![], std::io::Cursor::new(vec![0u8; 10])))
        });
        let source = RangeSource::new("http://h/k");
        let (outcome, _) = run_part(&transport, PartSpec { index: 0, start: 0, end: 9 }, &source);
        assert!(matches!(outcome.unwrap_err().error, ClientError::ProtocolMismatch(_)));
    }

    #[test]
    fn upload_returns_unquoted_etag() {
        let transport = MockTransport::new(|req| {
            assert_eq!(req.body.len(), 3);
            Ok(HttpResponse::new(
                200,
                vec![("ETag".to_string(), "\"frag-1\"".to_string())],
                std::io::empty(),
            ))
        });
        let request = HttpRequest::new(Method::Put, "http://h/k").body(vec![1u8, 2, 3]);
        let result = upload_part(&transport, 1, request).unwrap();

        assert_eq!(result.etag.as_deref(), Some("frag-1"));
        assert_eq!(result.bytes_transferred, 3);
    }

    #[test]
    fn upload_without_etag_is_a_mismatch() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::new(200, vec![], std::io::empty())));
        let request = HttpRequest::new(Method::Put, "http://h/k");
        assert!(matches!(
            upload_part(&transport, 0, request),
            Err(ClientError::ProtocolMismatch(_))
        ));
    }
}
