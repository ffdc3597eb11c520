//! Paginated fetcher module
//!
//! Fetches one page of a remote resource at a time, caches each page once
//! it has been fetched, and cancels requests that a page change or
//! teardown has made obsolete.
//!
//! # Overview
//!
//! - `PaginatedFetcher` - owns the page cursor, cache and request lifecycle
//! - `PageSnapshot` - `{ page, data, is_fetching, error }` as seen by consumers
//! - `PageSetter` - detached handle for changing the page
//! - `PageCache` - write-once page-keyed results
//! - `RequestEpoch` - generation marker for stale-response suppression

mod cache;
mod epoch;
mod paginated;
mod types;

pub use cache::PageCache;
pub use epoch::RequestEpoch;
pub use paginated::{PageData, PageSetter, PaginatedFetcher};
pub use types::{FetchState, FetcherStats, PageEndpoint, PageSnapshot, DEFAULT_PAGE_PARAM};

#[cfg(test)]
mod tests;
