//! Streaming object reads

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::progress::{ProgressAggregator, ProgressCallback, ProgressConfig};
use crate::{ClientError, Result};
use std::io::{self, ErrorKind, Read, Write};
use tracing::debug;
use ufile_core::etag::strip_quotes;
use ufile_net::{headers, HttpResponse};

/// Body of a whole-object GET, readable incrementally
pub struct ObjectStream {
    response: HttpResponse,
    etag: Option<String>,
    content_length: Option<u64>,
    content_type: Option<String>,
}

impl ObjectStream {
    pub(crate) fn from_response(response: HttpResponse) -> Self {
        let etag = response
            .header(headers::ETAG)
            .map(|v| strip_quotes(v).to_string());
        let content_length = response
            .header(headers::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok());
        let content_type = response.header(headers::CONTENT_TYPE).map(str::to_string);

        ObjectStream {
            response,
            etag,
            content_length,
            content_type,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Copy the rest of the body into `writer`, reporting progress against
    /// the advertised length. Without a length every callback carries the
    /// running count and a total of 0. Returns the number of bytes copied.
    pub fn redirect_to<W: Write>(
        mut self,
        writer: &mut W,
        progress: ProgressConfig,
        callback: Option<ProgressCallback>,
    ) -> Result<u64> {
        let aggregator = match self.content_length {
            Some(total) => ProgressAggregator::new(total, progress, callback),
            None => ProgressAggregator::unbounded(progress, callback),
        };
        let _guard = aggregator.guard();
        aggregator.start();

        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = match self.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            writer.write_all(&buf[..n])?;
            copied += n as u64;
            aggregator.record_write(n as u64);
        }
        writer.flush()?;

        if let Some(expected) = self.content_length {
            if copied != expected {
                return Err(ClientError::mismatch(format!(
                    "stream ended after {} of {} bytes",
                    copied, expected
                )));
            }
        }

        aggregator.finish();
        debug!(bytes = copied, "stream copied");
        Ok(copied)
    }
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.body_mut().read(buf)
    }
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("etag", &self.etag)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn stream(body: Vec<u8>, length: usize) -> ObjectStream {
        ObjectStream::from_response(HttpResponse::new(
            200,
            vec![
                ("Content-Length".to_string(), length.to_string()),
                ("ETag".to_string(), "\"tag\"".to_string()),
            ],
            Cursor::new(body),
        ))
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<(u64, u64)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |written, total| {
            sink.lock().unwrap().push((written, total));
        });
        (callback, seen)
    }

    #[test]
    fn redirect_copies_and_reports_total() {
        let (callback, seen) = recorder();

        let s = stream(vec![7u8; 300_000], 300_000);
        assert_eq!(s.etag(), Some("tag"));

        let mut out = Vec::new();
        let copied = s
            .redirect_to(&mut out, ProgressConfig::Percent(50), Some(callback))
            .unwrap();

        assert_eq!(copied, 300_000);
        assert_eq!(out.len(), 300_000);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&(300_000, 300_000)));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn unknown_length_reports_running_count() {
        let (callback, seen) = recorder();
        let body = io::repeat(3).take(300_000);
        let s = ObjectStream::from_response(HttpResponse::new(200, Vec::new(), body));
        assert_eq!(s.content_length(), None);

        let mut out = Vec::new();
        let copied = s
            .redirect_to(&mut out, ProgressConfig::BufferSize(1), Some(callback))
            .unwrap();

        assert_eq!(copied, 300_000);
        let seen = seen.lock().unwrap();
        assert!(seen.len() > 2, "expected a callback per read, got {:?}", seen);
        assert!(seen.iter().all(|&(_, total)| total == 0));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen[0].0 as usize, DEFAULT_BUFFER_SIZE.min(300_000));
        assert_eq!(seen.last(), Some(&(300_000, 0)));
    }

    #[test]
    fn short_stream_is_a_mismatch() {
        let s = stream(vec![1u8; 10], 20);
        let mut out = Vec::new();
        assert!(matches!(
            s.redirect_to(&mut out, ProgressConfig::default(), None),
            Err(ClientError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn plain_read() {
        let mut s = stream(b"hello".to_vec(), 5);
        let mut text = String::new();
        s.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(s.content_length(), Some(5));
    }
}
