//! Error types for the dashboard REST client.

use thiserror::Error;

/// Result type for dashboard API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Dashboard API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend unreachable (connection refused, timeout, TLS failure)
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// 401 - missing, invalid or expired credentials
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// 403 - authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404 - missing record or endpoint
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(_) | ApiError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err)
        }
    }
}
