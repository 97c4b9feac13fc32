//! Client error types

use crate::worker::PartFailure;
use thiserror::Error;
use ufile_net::{ErrorBody, NetError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("HTTP error: status {status}{}", describe_body(.body))]
    Http {
        status: u16,
        body: Option<ErrorBody>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Transfer failed: {} part(s) failed", .failures.len())]
    AggregateTransfer { failures: Vec<PartFailure> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Core error: {0}")]
    Core(#[from] ufile_core::UFileError),
}

fn describe_body(body: &Option<ErrorBody>) -> String {
    match body {
        Some(body) => format!(" ({})", body),
        None => String::new(),
    }
}

impl ClientError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }

    pub(crate) fn mismatch(msg: impl Into<String>) -> Self {
        ClientError::ProtocolMismatch(msg.into())
    }

    /// Server error body, looking through aggregated part failures
    pub fn error_body(&self) -> Option<&ErrorBody> {
        match self {
            ClientError::Http { body, .. } => body.as_ref(),
            ClientError::AggregateTransfer { failures } => {
                failures.iter().find_map(|f| f.error.error_body())
            }
            _ => None,
        }
    }

    /// HTTP status of the failure, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_includes_body() {
        let err = ClientError::Http {
            status: 404,
            body: Some(ErrorBody {
                ret_code: -148643,
                err_msg: "file not exist".to_string(),
                session_id: None,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("file not exist"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn aggregate_exposes_first_body() {
        let err = ClientError::AggregateTransfer {
            failures: vec![
                PartFailure {
                    index: 0,
                    error: ClientError::mismatch("short body"),
                },
                PartFailure {
                    index: 3,
                    error: ClientError::Http {
                        status: 500,
                        body: Some(ErrorBody {
                            ret_code: 1,
                            err_msg: "boom".to_string(),
                            session_id: Some("s".to_string()),
                        }),
                    },
                },
            ],
        };

        assert_eq!(err.to_string(), "Transfer failed: 2 part(s) failed");
        assert_eq!(err.error_body().map(|b| b.err_msg.as_str()), Some("boom"));
    }
}
