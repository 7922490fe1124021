//! Data gateway error types

use thiserror::Error;

/// Failure of a single query or subscription against a data source
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The service could not be reached (connect error, timeout)
    #[error("Data service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a non-success status
    #[error("Query rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Unreachable(err.to_string())
        }
    }
}

impl From<crate::storage::StorageError> for GatewayError {
    fn from(err: crate::storage::StorageError) -> Self {
        GatewayError::Storage(err.to_string())
    }
}
