//! Error types for Consul API operations.
//!
//! Errors are categorized so that the retry loop only repeats transient
//! failures and callers can tell a refused request from a broken one.

use std::fmt;

/// Result type alias for consulkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// The token lacks the required ACL permission.
    PermissionDenied,
    /// Key or endpoint not found.
    NotFound,
    /// Response could not be decoded.
    Format,
    /// Client configuration is unusable.
    Config,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::PermissionDenied => "Permission denied",
            Self::NotFound => "Not found",
            Self::Format => "Invalid response format",
            Self::Config => "Invalid client configuration",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the Consul agent is reachable and try again",
            Self::PermissionDenied => "Check the ACL token and its policies",
            Self::NotFound => "Verify the key path and datacenter",
            Self::Format => "Check that the address points at a Consul HTTP API",
            Self::Config => "Check the provider address and scheme",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Consul.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed or returned an unexpected status.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Consul answered 403.
    #[error("Unexpected response code: 403 ({message})")]
    PermissionDenied {
        /// Body returned by Consul.
        message: String,
    },

    /// Consul answered 404 where a resource was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Build an error from a non-success status code and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        match status {
            403 => Self::PermissionDenied {
                message: if body.is_empty() {
                    "Permission denied".to_string()
                } else {
                    body.to_string()
                },
            },
            404 => Self::NotFound(body.to_string()),
            _ => Self::HttpError {
                message: format!("Unexpected response code: {status} ({body})"),
                status: Some(status),
            },
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::HttpError { status, .. } => match status {
                Some(s) if *s < 500 => ErrorCategory::Other,
                _ => ErrorCategory::Network,
            },
            Error::PermissionDenied { .. } => ErrorCategory::PermissionDenied,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether Consul refused the request for lack of permission.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.category() == ErrorCategory::PermissionDenied
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::from_status(code, ""),
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
