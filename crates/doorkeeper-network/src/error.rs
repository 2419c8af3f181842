use thiserror::Error;

/// Errors from connectivity probing and notification delivery.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// An operation did not finish in time
    #[error("Timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The peer could not be reached
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The peer answered with a non-success status
    #[error("Peer returned HTTP {code}")]
    Status { code: u16 },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }
}

/// Result alias for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(NetworkError::timeout(1500).to_string(), "Timeout after 1500ms");
        assert_eq!(
            NetworkError::Status { code: 503 }.to_string(),
            "Peer returned HTTP 503"
        );
        assert!(
            NetworkError::connection("refused")
                .to_string()
                .contains("refused")
        );
    }
}
