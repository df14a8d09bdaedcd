//! Error types for the transfer server.

/// Failures the connection-handling path can hit.
///
/// None of these propagate as panics; protocol errors become 400 responses
/// and transport errors close the connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The upload's Content-Type carried no multipart boundary.
    #[error("Content-Type carries no multipart boundary")]
    MissingBoundary,

    /// The request could not be framed or parsed.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
