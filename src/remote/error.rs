//! Classification of remote outcomes.
//!
//! Every response the gateway sees is mapped onto [`RemoteError`] here, and
//! callers decide retry-vs-queue-vs-fail from that value alone.

use serde::Deserialize;
use thiserror::Error;

/// Longest response text carried in a client error message.
const MAX_MESSAGE_LEN: usize = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Unauthorized: check the API token")]
    Unauthorized,

    #[error("Not found on server")]
    NotFound,

    #[error("Request rejected ({status}){}", detail(.message))]
    Client { status: u16, message: Option<String> },

    #[error("Server error ({status})")]
    Server { status: u16 },

    #[error("Unexpected response status {0}")]
    UnknownStatus(u16),

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Transport setup failed: {0}")]
    Setup(String),
}

impl RemoteError {
    /// True when no response was received at all. Only these failures are
    /// retried through the pending queue.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Maps an HTTP status (and its body, for client errors) onto the taxonomy.
pub fn classify(status: u16, body: &[u8]) -> Result<(), RemoteError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(RemoteError::Unauthorized),
        404 => Err(RemoteError::NotFound),
        400..=499 => Err(RemoteError::Client {
            status,
            message: error_message(body),
        }),
        500..=599 => Err(RemoteError::Server { status }),
        _ => Err(RemoteError::UnknownStatus(status)),
    }
}

fn detail(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {}", m),
        None => String::new(),
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return Some(message);
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(MAX_MESSAGE_LEN).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success_range() {
        assert!(classify(200, b"").is_ok());
        assert!(classify(204, b"").is_ok());
    }

    #[test]
    fn test_classify_status_table() {
        assert_eq!(classify(401, b""), Err(RemoteError::Unauthorized));
        assert_eq!(classify(404, b""), Err(RemoteError::NotFound));
        assert_eq!(
            classify(422, b""),
            Err(RemoteError::Client {
                status: 422,
                message: None
            })
        );
        assert_eq!(classify(503, b""), Err(RemoteError::Server { status: 503 }));
        assert_eq!(classify(302, b""), Err(RemoteError::UnknownStatus(302)));
    }

    #[test]
    fn test_client_error_message_from_json() {
        let err = classify(400, br#"{"message":"name is required"}"#).unwrap_err();
        assert_eq!(
            err,
            RemoteError::Client {
                status: 400,
                message: Some("name is required".to_string())
            }
        );
        assert_eq!(err.to_string(), "Request rejected (400): name is required");
    }

    #[test]
    fn test_client_error_message_from_text() {
        let err = classify(409, b"  conflict  ").unwrap_err();
        assert_eq!(
            err,
            RemoteError::Client {
                status: 409,
                message: Some("conflict".to_string())
            }
        );
    }

    #[test]
    fn test_only_unreachable_is_network() {
        assert!(RemoteError::Unreachable("refused".into()).is_network());
        assert!(!RemoteError::Server { status: 500 }.is_network());
        assert!(!RemoteError::Decode("bad".into()).is_network());
        assert!(!RemoteError::Unauthorized.is_network());
    }
}
