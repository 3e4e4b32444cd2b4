use thiserror::Error;

/// Errors raised while relaying a chat exchange
#[derive(Error, Debug)]
pub enum RelayError {
    /// The incoming request was rejected before any state was touched
    #[error("{0}")]
    ValidationError(String),

    #[error("Credential Error: {0}")]
    CredentialError(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    /// Transport failure talking to the remote API
    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Upstream timed out: {0}")]
    Timeout(String),

    /// The remote API answered with a non-success status
    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Parsing Error: {0}")]
    ParsingError(String),
}

impl RelayError {
    /// True for failures caused by the remote generative API itself
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RelayError::RequestError(_) | RelayError::Timeout(_) | RelayError::HttpError { .. }
        )
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_displays_bare_message() {
        let err = RelayError::ValidationError("Empty message".to_string());
        assert_eq!(err.to_string(), "Empty message");
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_upstream_classification() {
        let err = RelayError::HttpError {
            status_code: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "HTTP Error: 503 - unavailable");
        assert!(RelayError::Timeout("60s".to_string()).is_upstream());
        assert!(!RelayError::CredentialError("missing".to_string()).is_upstream());
    }
}
