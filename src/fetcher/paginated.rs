//! Paginated fetcher
//!
//! Owns the page cursor, the page cache and the lifecycle of the one
//! request that may be active at a time. All state sits behind a single
//! mutex; the only suspension point is the transport call, which runs in a
//! spawned task holding a weak reference back to the fetcher.

use super::cache::PageCache;
use super::epoch::{EpochTracker, RequestEpoch};
use super::types::{FetchState, FetcherStats, PageEndpoint, PageSnapshot};
use crate::config::FetcherConfig;
use crate::error::{FetchError, Result};
use crate::http::{HttpTransport, Transport, TransportResponse};
use crate::types::PageKey;
use futures::future::{abortable, Aborted};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Bounds a page result type must satisfy
pub trait PageData: DeserializeOwned + Send + Sync + 'static {}

impl<T> PageData for T where T: DeserializeOwned + Send + Sync + 'static {}

struct Inner<T> {
    page: PageKey,
    cache: PageCache<T>,
    state: FetchState<T>,
    epochs: EpochTracker,
    stats: FetcherStats,
    /// Dropped on teardown, which closes every subscription
    notify: Option<watch::Sender<PageSnapshot<T>>>,
}

impl<T> Inner<T> {
    fn snapshot(&self) -> PageSnapshot<T> {
        PageSnapshot {
            page: self.page,
            data: self.cache.get(self.page),
            is_fetching: self.state.is_fetching(),
            error: self.state.error().cloned(),
        }
    }

    fn publish(&self) {
        if let Some(ref notify) = self.notify {
            notify.send_replace(self.snapshot());
        }
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    transport: Arc<dyn Transport>,
    endpoint: PageEndpoint,
    runtime: Handle,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn teardown(&self) {
        let mut inner = self.lock();
        if inner.epochs.is_torn_down() {
            return;
        }
        if inner.epochs.teardown() {
            inner.stats.cancelled += 1;
        }
        inner.notify = None;
        info!("Fetcher torn down on page {} ({})", inner.page, inner.stats);
    }
}

impl<T: PageData> Shared<T> {
    /// Move to a new page and run the fetch cycle for it
    fn set_page_with(self: &Arc<Self>, f: impl FnOnce(PageKey) -> PageKey) {
        let mut inner = self.lock();
        let page = f(inner.page);

        if inner.epochs.is_torn_down() {
            debug!("Ignoring page {} after teardown", page);
            return;
        }

        // Re-selecting the page being fetched keeps its request
        if page == inner.page && inner.state.is_fetching() {
            debug!("Page {} already being fetched", page);
            return;
        }

        if inner.epochs.cancel_in_flight() {
            inner.stats.cancelled += 1;
            debug!("Cancelled in-flight request for page {}", inner.page);
        }
        let epoch = inner.epochs.advance();
        inner.page = page;

        if let Some(hit) = inner.cache.get(page) {
            debug!("Page {} served from cache", page);
            inner.stats.cache_hits += 1;
            inner.state = FetchState::Settled(hit);
            inner.publish();
            return;
        }

        inner.state = FetchState::Fetching;
        inner.stats.requests += 1;
        inner.publish();

        let url = self.endpoint.url_for(page);
        debug!("Fetching page {} from {} [epoch {}]", page, url, epoch);

        let transport = Arc::clone(&self.transport);
        let (request, handle) = abortable(async move { transport.get(url).await });
        inner.epochs.track(epoch, handle);
        drop(inner);

        let shared = Arc::downgrade(self);
        self.runtime.spawn(async move {
            match request.await {
                Ok(outcome) => {
                    if let Some(shared) = shared.upgrade() {
                        shared.commit(epoch, page, outcome);
                    }
                }
                Err(Aborted) => debug!("Request for page {} aborted [epoch {}]", page, epoch),
            }
        });
    }

    /// Record the outcome of a request if its epoch is still current
    fn commit(
        &self,
        epoch: RequestEpoch,
        page: PageKey,
        outcome: std::result::Result<TransportResponse, FetchError>,
    ) {
        let outcome = outcome.and_then(decode::<T>);

        let mut inner = self.lock();
        if !inner.epochs.is_current(epoch) {
            debug!("Discarding stale response for page {} [epoch {}]", page, epoch);
            return;
        }
        inner.epochs.finish(epoch);

        match outcome {
            Ok(value) => {
                let value = inner.cache.insert(page, Arc::new(value));
                inner.stats.settled += 1;
                inner.state = FetchState::Settled(value);
                debug!("Page {} settled", page);
            }
            Err(err) => {
                warn!("Fetching page {} failed: {}", page, err);
                inner.stats.failed += 1;
                inner.state = FetchState::Failed(err);
            }
        }
        inner.publish();
    }
}

/// Turn a raw response into a page result
fn decode<T: DeserializeOwned>(response: TransportResponse) -> std::result::Result<T, FetchError> {
    if !response.is_success() {
        return Err(FetchError::Http {
            status: response.status,
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| FetchError::decode(e.to_string()))
}

/// Fetches one page at a time and caches every page it has seen
///
/// The fetcher is the owning component: dropping it tears it down, which
/// aborts any in-flight request and freezes the observed state.
///
/// ```rust,ignore
/// use paged_fetch::{PageEndpoint, PaginatedFetcher, HttpTransport};
/// use std::sync::Arc;
///
/// let endpoint = PageEndpoint::parse("https://api.example.com/items")?;
/// let fetcher: PaginatedFetcher<serde_json::Value> =
///     PaginatedFetcher::mount(Arc::new(HttpTransport::new()?), endpoint)?;
///
/// let first = fetcher.settled().await;
/// fetcher.set_page(2);
/// let second = fetcher.settled().await;
/// ```
pub struct PaginatedFetcher<T> {
    shared: Arc<Shared<T>>,
}

impl<T: PageData> PaginatedFetcher<T> {
    /// Create an idle fetcher on the first page without requesting anything
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, endpoint: PageEndpoint) -> Result<Self> {
        let runtime = Handle::try_current()?;
        let page = PageKey::FIRST;
        let (notify, _) = watch::channel(PageSnapshot::initial(page));

        let inner = Inner {
            page,
            cache: PageCache::new(),
            state: FetchState::Idle,
            epochs: EpochTracker::new(),
            stats: FetcherStats::default(),
            notify: Some(notify),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                transport,
                endpoint,
                runtime,
            }),
        })
    }

    /// Create a fetcher and start fetching the first page
    pub fn mount(transport: Arc<dyn Transport>, endpoint: PageEndpoint) -> Result<Self> {
        Self::mount_at(transport, endpoint, PageKey::FIRST)
    }

    /// Create a fetcher and start fetching the given page
    pub fn mount_at(
        transport: Arc<dyn Transport>,
        endpoint: PageEndpoint,
        page: impl Into<PageKey>,
    ) -> Result<Self> {
        let fetcher = Self::new(transport, endpoint)?;
        fetcher.set_page(page);
        Ok(fetcher)
    }

    /// Build an HTTP-backed fetcher from validated configuration and mount it
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let transport =
            HttpTransport::with_config(config.transport_config(), config.credentials.clone())?;
        Self::mount_at(Arc::new(transport), config.endpoint(), config.start_page)
    }

    /// Switch to a page, fetching it unless it is cached
    pub fn set_page(&self, page: impl Into<PageKey>) {
        let page = page.into();
        self.shared.set_page_with(|_| page);
    }

    /// Switch to a page computed from the current one
    pub fn set_page_with(&self, f: impl FnOnce(PageKey) -> PageKey) {
        self.shared.set_page_with(f);
    }

    /// A detached handle that can change the page
    pub fn setter(&self) -> PageSetter<T> {
        PageSetter {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// The current page
    pub fn page(&self) -> PageKey {
        self.shared.lock().page
    }

    /// Cached result for the current page
    pub fn data(&self) -> Option<Arc<T>> {
        let inner = self.shared.lock();
        inner.cache.get(inner.page)
    }

    /// Whether the current page is being fetched
    pub fn is_fetching(&self) -> bool {
        self.shared.lock().state.is_fetching()
    }

    /// Error of the latest request
    pub fn error(&self) -> Option<FetchError> {
        self.shared.lock().state.error().cloned()
    }

    /// State of the current request epoch
    pub fn state(&self) -> FetchState<T> {
        self.shared.lock().state.clone()
    }

    /// Everything a consumer observes, taken atomically
    pub fn snapshot(&self) -> PageSnapshot<T> {
        self.shared.lock().snapshot()
    }

    /// Counters for this instance
    pub fn stats(&self) -> FetcherStats {
        self.shared.lock().stats
    }

    /// Whether a page is in the cache
    pub fn is_cached(&self, page: impl Into<PageKey>) -> bool {
        self.shared.lock().cache.contains(page.into())
    }

    /// Cached pages in ascending order
    pub fn cached_pages(&self) -> Vec<PageKey> {
        self.shared.lock().cache.pages()
    }

    /// The endpoint pages are fetched from
    pub fn endpoint(&self) -> &PageEndpoint {
        &self.shared.endpoint
    }

    /// Watch snapshots as they change
    ///
    /// The channel closes on teardown; the last value stays readable.
    pub fn subscribe(&self) -> watch::Receiver<PageSnapshot<T>> {
        let inner = self.shared.lock();
        match inner.notify {
            Some(ref notify) => notify.subscribe(),
            None => watch::channel(inner.snapshot()).1,
        }
    }

    /// Wait until the current page is no longer fetching
    ///
    /// Returns immediately after teardown.
    pub async fn settled(&self) -> PageSnapshot<T> {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|snapshot| !snapshot.is_fetching).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.snapshot())
    }

    /// Abort any in-flight request and freeze the observed state
    pub fn teardown(&self) {
        self.shared.teardown();
    }

    /// Whether the fetcher has been torn down
    pub fn is_torn_down(&self) -> bool {
        self.shared.lock().epochs.is_torn_down()
    }
}

#[cfg(test)]
impl<T: PageData> PaginatedFetcher<T> {
    pub(super) fn current_epoch(&self) -> RequestEpoch {
        self.shared.lock().epochs.current()
    }

    /// Run the commit path as if the request of `epoch` had just resolved
    pub(super) fn resolve(
        &self,
        epoch: RequestEpoch,
        page: PageKey,
        outcome: std::result::Result<TransportResponse, FetchError>,
    ) {
        self.shared.commit(epoch, page, outcome);
    }
}

impl<T> Drop for PaginatedFetcher<T> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl<T> std::fmt::Debug for PaginatedFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("PaginatedFetcher")
            .field("endpoint", &self.shared.endpoint)
            .field("page", &inner.page)
            .field("epoch", &inner.epochs.current())
            .field("cached_pages", &inner.cache.len())
            .field("in_flight", &inner.epochs.has_in_flight())
            .field("torn_down", &inner.epochs.is_torn_down())
            .finish_non_exhaustive()
    }
}

/// Changes the page of a fetcher without owning it
///
/// Does nothing once the fetcher is torn down or dropped.
pub struct PageSetter<T> {
    shared: Weak<Shared<T>>,
}

impl<T: PageData> PageSetter<T> {
    /// Switch the fetcher to a page
    pub fn set(&self, page: impl Into<PageKey>) {
        let page = page.into();
        self.update(|_| page);
    }

    /// Switch the fetcher to a page computed from the current one
    pub fn update(&self, f: impl FnOnce(PageKey) -> PageKey) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_page_with(f);
        }
    }

    /// Whether the fetcher still exists
    pub fn is_attached(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl<T> Clone for PageSetter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for PageSetter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSetter")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}
