//! Fetcher state and snapshot types

use crate::error::{FetchError, Result};
use crate::types::PageKey;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Default query parameter carrying the page number
pub const DEFAULT_PAGE_PARAM: &str = "page";

// ============================================================================
// Endpoint
// ============================================================================

/// Where pages are fetched from
///
/// Page `n` of `https://api.example.com/items` is requested as
/// `https://api.example.com/items?page=n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEndpoint {
    base_url: Url,
    page_param: String,
}

impl PageEndpoint {
    /// Create an endpoint using the default `page` parameter
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            page_param: DEFAULT_PAGE_PARAM.to_string(),
        }
    }

    /// Parse an endpoint from a URL string
    pub fn parse(base_url: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Use a different query parameter for the page number
    #[must_use]
    pub fn with_page_param(mut self, page_param: impl Into<String>) -> Self {
        self.page_param = page_param.into();
        self
    }

    /// Base URL without the page parameter
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Name of the page query parameter
    pub fn page_param(&self) -> &str {
        &self.page_param
    }

    /// URL for a given page
    ///
    /// Other query parameters on the base URL are kept; an existing page
    /// parameter is replaced.
    pub fn url_for(&self, page: PageKey) -> Url {
        let kept: Vec<(String, String)> = self
            .base_url
            .query_pairs()
            .filter(|(key, _)| key != self.page_param.as_str())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&self.page_param, &page.to_string());
        url
    }
}

// ============================================================================
// Per-epoch state
// ============================================================================

/// Lifecycle of the current request epoch
///
/// `Idle → Fetching → Settled | Failed`. A cancelled epoch is simply
/// replaced by the next one and never shows up here.
#[derive(Debug)]
pub enum FetchState<T> {
    /// Nothing requested yet
    Idle,
    /// A request for the current page is in flight
    Fetching,
    /// The current page is available
    Settled(Arc<T>),
    /// The request for the current page failed
    Failed(FetchError),
}

impl<T> FetchState<T> {
    /// Whether a request is in flight
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching)
    }

    /// Error of the current epoch, if it failed
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Fetching => Self::Fetching,
            Self::Settled(value) => Self::Settled(Arc::clone(value)),
            Self::Failed(err) => Self::Failed(err.clone()),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// What a consumer observes
#[derive(Debug, PartialEq)]
pub struct PageSnapshot<T> {
    /// The current page
    pub page: PageKey,
    /// Cached result for the current page, if any
    pub data: Option<Arc<T>>,
    /// Whether the current page is being fetched
    pub is_fetching: bool,
    /// Error of the latest request, if it failed
    pub error: Option<FetchError>,
}

impl<T> PageSnapshot<T> {
    /// Snapshot of a fetcher that has not requested anything yet
    pub fn initial(page: PageKey) -> Self {
        Self {
            page,
            data: None,
            is_fetching: false,
            error: None,
        }
    }

    /// Whether the snapshot is final for its page
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && (self.data.is_some() || self.error.is_some())
    }
}

impl<T> Clone for PageSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            page: self.page,
            data: self.data.clone(),
            is_fetching: self.is_fetching,
            error: self.error.clone(),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters for one fetcher instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetcherStats {
    /// Network requests issued
    pub requests: u64,
    /// Page changes served from the cache
    pub cache_hits: u64,
    /// Requests that settled successfully
    pub settled: u64,
    /// Requests that failed
    pub failed: u64,
    /// Requests aborted by a page change or teardown
    pub cancelled: u64,
}

impl fmt::Display for FetcherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} cache_hits={} settled={} failed={} cancelled={}",
            self.requests, self.cache_hits, self.settled, self.failed, self.cancelled
        )
    }
}
