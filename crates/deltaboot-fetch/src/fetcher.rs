//! Fetcher implementations

use crate::error::TransportError;
use reqwest::blocking::Client;
use reqwest::Url;
use std::fs;
use std::time::Duration;

/// Retrieves the full byte content behind a URL
///
/// Success only means the transfer completed; callers must verify the digest
/// before trusting the bytes.
pub trait Fetch {
    /// Fetch every byte behind `url`
    ///
    /// # Errors
    /// Returns [`TransportError`] on any transport failure or partial transfer
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(url)
    }
}

/// Blocking fetcher for `http`, `https` and `file` URLs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher without an overall request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be initialized
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    /// Create a fetcher with an optional overall request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be initialized
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("deltaboot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxy, TLS roots, timeouts)
    #[inline]
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let advertised = response.content_length();
        let body = response.bytes().map_err(|source| TransportError::Body {
            url: url.to_string(),
            source,
        })?;

        let received = body.len() as u64;
        if let Some(expected) = advertised {
            if expected != received {
                return Err(TransportError::Truncated {
                    url: url.to_string(),
                    expected,
                    received,
                });
            }
        }
        Ok(body.to_vec())
    }

    fn fetch_file(url: &Url) -> Result<Vec<u8>, TransportError> {
        let path = url.to_file_path().map_err(|()| TransportError::InvalidFileUrl {
            url: url.to_string(),
        })?;
        fs::read(&path).map_err(|source| TransportError::File { path, source })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        tracing::info!(%url, "fetching");
        let bytes = match url.scheme() {
            "http" | "https" => self.fetch_http(url)?,
            "file" => Self::fetch_file(url)?,
            scheme => {
                return Err(TransportError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: scheme.to_string(),
                })
            }
        };
        tracing::debug!(%url, len = bytes.len(), "fetch complete");
        Ok(bytes)
    }
}
