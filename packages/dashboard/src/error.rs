use dashboard_api::ApiError;
use thiserror::Error;

use crate::validation::ValidationErrors;

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Failure taxonomy shared by the session store, gateways and tables.
///
/// Every variant is a value the UI can render; none of them abort rendering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// Client-side form validation, one message per field
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Invalid credentials or expired token
    #[error("{0}")]
    Auth(String),

    /// Backend rejected the request (duplicate email, wrong current password, ...)
    #[error("{0}")]
    Rejected(String),

    /// Backend unreachable or answering garbage
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Admin access required")]
    Forbidden,

    /// Protected operation attempted without a session
    #[error("Not signed in")]
    NotAuthenticated,

    /// Operation not allowed from the current session state
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// A run of the same operation is already in flight
    #[error("{0} already in progress")]
    InProgress(&'static str),

    /// A newer request replaced this one before it completed
    #[error("{0} was superseded by a newer request")]
    Superseded(&'static str),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse classification used to pick how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inline, per field
    Validation,
    /// Form-level message
    Auth,
    /// Banner or fallback
    Network,
    /// Empty result
    NotFound,
    /// Local persistence failure
    Storage,
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Validation(_) => ErrorKind::Validation,
            DashboardError::Auth(_)
            | DashboardError::Rejected(_)
            | DashboardError::Forbidden
            | DashboardError::NotAuthenticated
            | DashboardError::InvalidTransition { .. }
            | DashboardError::InProgress(_)
            | DashboardError::Superseded(_) => ErrorKind::Auth,
            DashboardError::Network(_) => ErrorKind::Network,
            DashboardError::NotFound(_) => ErrorKind::NotFound,
            DashboardError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// True when the backend no longer accepts the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DashboardError::Auth(_))
    }
}

impl From<ApiError> for DashboardError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(e) => DashboardError::Network(e.to_string()),
            ApiError::Decode(message) => DashboardError::Network(message),
            ApiError::Unauthorized(message) => DashboardError::Auth(message),
            ApiError::Forbidden(_) => DashboardError::Forbidden,
            ApiError::NotFound(message) => DashboardError::NotFound(message),
            ApiError::Api { status, message } if status < 500 => DashboardError::Rejected(message),
            ApiError::Api { status, message } => {
                DashboardError::Network(format!("backend error {status}: {message}"))
            }
        }
    }
}

impl From<ValidationErrors> for DashboardError {
    fn from(errors: ValidationErrors) -> Self {
        DashboardError::Validation(errors)
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_onto_taxonomy() {
        let unauthorized: DashboardError = ApiError::Unauthorized("expired".into()).into();
        assert_eq!(unauthorized, DashboardError::Auth("expired".into()));
        assert_eq!(unauthorized.kind(), ErrorKind::Auth);

        let duplicate: DashboardError = ApiError::Api {
            status: 400,
            message: "Email already registered".into(),
        }
        .into();
        assert_eq!(duplicate, DashboardError::Rejected("Email already registered".into()));

        let outage: DashboardError = ApiError::Api {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert_eq!(outage.kind(), ErrorKind::Network);

        let missing: DashboardError = ApiError::NotFound("no such user".into()).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }
}
