//! Transport errors
//!
//! All of these are fatal for the current run; nothing is retried.

use std::io;
use std::path::PathBuf;

/// Failure to retrieve bytes from a URL
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP client could not be constructed
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// URL scheme is not http, https or file
    #[error("unsupported url scheme {scheme:?} in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    /// `file:` URL does not map to a local path
    #[error("file url {url} does not name a local path")]
    InvalidFileUrl { url: String },

    /// Local file could not be read
    #[error("failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Connection or request failure
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// Response body could not be read to the end
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Fewer or more bytes arrived than advertised
    #[error("truncated transfer from {url}: expected {expected} bytes, received {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },
}
