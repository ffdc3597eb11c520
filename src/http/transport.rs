//! Transport abstraction
//!
//! The fetcher only needs a cancellable GET. Cancellation is dropping the
//! returned future, so implementations must not detach work that commits
//! anything on their own.

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// Raw response handed back to the fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Undecoded body
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response from a status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response with a JSON body
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A cancellable HTTP GET
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fetch the given URL
    ///
    /// Any status code is a successful transport result. Only failures to
    /// get a response at all are errors.
    async fn get(&self, url: Url) -> Result<TransportResponse, FetchError>;
}
