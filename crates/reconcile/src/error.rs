//! Error types for reconciliation

use std::fmt;
use thiserror::Error;

/// Store call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Get,
    Put,
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Put => write!(f, "put"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Errors that abort a reconciliation
#[derive(Error, Debug)]
pub enum Error {
    /// Scope lookup failed for a reason other than missing permission
    #[error("failed to get datacenter from agent: {source}")]
    ScopeDiscoveryFailed {
        #[source]
        source: anyhow::Error,
    },

    /// A get, put or delete against the store failed
    #[error("failed to {operation} key '{path}': {source}")]
    StoreOperationFailed {
        operation: StoreOperation,
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// An entry without a usable path
    #[error("failed to get path for key '{label}'")]
    MalformedEntry { label: String },
}

impl Error {
    /// Path involved in the failure, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::StoreOperationFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
