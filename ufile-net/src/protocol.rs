//! Wire helpers: header names, Range / Content-Range, server error bodies

use crate::{NetError, Result};
use serde::{Deserialize, Serialize};
use ufile_core::auth::uri_encode;

/// Status of a successful ranged GET
pub const STATUS_PARTIAL_CONTENT: u16 = 206;

/// Status of every other successful object call
pub const STATUS_OK: u16 = 200;

/// Header names used by the object APIs
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const DATE: &str = "Date";
    pub const RANGE: &str = "Range";
    pub const CONTENT_RANGE: &str = "Content-Range";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const ACCEPT_RANGES: &str = "Accept-Ranges";
    pub const LAST_MODIFIED: &str = "Last-Modified";
    pub const ETAG: &str = "ETag";
    pub const SESSION_ID: &str = "X-SessionId";
}

/// `Range` header value for an inclusive byte span
pub fn format_range(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}

/// Parsed `Content-Range: bytes <start>-<end>/<total>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// `None` when the server sent `*`
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || NetError::ContentRange(value.to_string());

        let spec = value.trim().strip_prefix("bytes").ok_or_else(invalid)?.trim_start();
        let (span, total) = spec.split_once('/').ok_or_else(invalid)?;
        let (start, end) = span.trim().split_once('-').ok_or_else(invalid)?;

        let start: u64 = start.trim().parse().map_err(|_| invalid())?;
        let end: u64 = end.trim().parse().map_err(|_| invalid())?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse::<u64>().map_err(|_| invalid())?),
        };

        if end < start {
            return Err(invalid());
        }
        if let Some(total) = total {
            if end >= total {
                return Err(invalid());
            }
        }

        Ok(ContentRange { start, end, total })
    }

    /// Number of bytes covered by the span
    pub fn span_len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Error body the service returns with non-success statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "RetCode", default)]
    pub ret_code: i64,
    #[serde(rename = "ErrMsg", default)]
    pub err_msg: String,
    /// Taken from the `X-SessionId` response header
    #[serde(skip)]
    pub session_id: Option<String>,
}

impl ErrorBody {
    /// Decode an error body; a non-JSON body is kept as the message
    pub fn decode(body: &[u8], session_id: Option<&str>) -> Option<Self> {
        if body.is_empty() && session_id.is_none() {
            return None;
        }

        let mut error = serde_json::from_slice::<ErrorBody>(body).unwrap_or_else(|_| ErrorBody {
            ret_code: 0,
            err_msg: String::from_utf8_lossy(body).into_owned(),
            session_id: None,
        });
        error.session_id = session_id.map(str::to_string);
        Some(error)
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RetCode={} ErrMsg={}", self.ret_code, self.err_msg)?;
        if let Some(session) = &self.session_id {
            write!(f, " SessionId={}", session)?;
        }
        Ok(())
    }
}

/// Append encoded query parameters; a parameter with an empty value is
/// written as a bare name (`?uploads`)
pub fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                uri_encode(k)
            } else {
                format!("{}={}", uri_encode(k), uri_encode(v))
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, sep, query)
}
