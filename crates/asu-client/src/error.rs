//! Error types for ASU client operations

use thiserror::Error;

use crate::types::Filesystem;

/// Result type alias for ASU client operations
pub type Result<T> = std::result::Result<T, AsuClientError>;

/// Errors that can occur during ASU client operations
///
/// Soft failures reported by the Image Builder service itself (an embedded
/// non-200/202 status in a build response body) are not errors — they are
/// returned as [`BuildResponse::Failed`](crate::BuildResponse::Failed) so
/// callers can branch on them as part of the normal polling flow.
#[derive(Error, Debug)]
pub enum AsuClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server returned an error response on a metadata route
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Filesystem name outside the set the Image Builder accepts
    #[error("Invalid filesystem {value:?}: expected one of {}", Filesystem::NAMES.join(", "))]
    InvalidFilesystem { value: String },
}

impl AsuClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}
