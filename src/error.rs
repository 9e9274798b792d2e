//! Error taxonomy for the agent and warehouse clients.
//!
//! Library-level operations return [`GenieError`]. Command-line and server
//! layers wrap it in `anyhow` the same way the rest of the crate reports
//! configuration and I/O failures.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`GenieError::Transport`] | network failure or non-2xx HTTP status |
//! | [`GenieError::Timeout`] | a client-side polling budget is exhausted |
//! | [`GenieError::QueryExecution`] | a statement ends FAILED/CANCELED or execution breaks |
//! | [`GenieError::MalformedResponse`] | a server payload lacks an expected key |
//! | [`GenieError::InvalidInput`] | caller input is rejected before any request |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("HTTP request to {url} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        url: String,
        message: String,
    },

    #[error("{what} did not finish within {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("query execution failed: {0}")]
    QueryExecution(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, GenieError>;

impl GenieError {
    /// HTTP status of a transport failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenieError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn missing_key(key: &str, payload: &str) -> Self {
        GenieError::MalformedResponse(format!("missing '{}' in {}", key, payload))
    }
}

impl From<reqwest::Error> for GenieError {
    fn from(e: reqwest::Error) -> Self {
        GenieError::Transport {
            status: e.status().map(|s| s.as_u16()),
            url: e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_includes_status() {
        let err = GenieError::Transport {
            status: Some(404),
            url: "http://x/api".into(),
            message: "not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP request to http://x/api failed with status 404: not found"
        );
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn transport_message_without_status() {
        let err = GenieError::Transport {
            status: None,
            url: "http://x/api".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP request to http://x/api failed: connection refused"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn missing_key_is_malformed() {
        let err = GenieError::missing_key("message_id", "start-conversation response");
        assert!(matches!(err, GenieError::MalformedResponse(_)));
        assert!(err.to_string().contains("message_id"));
    }
}
