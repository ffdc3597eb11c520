//! Tests for the paginated fetcher
//!
//! Responses come from a scripted transport: every request waits on a gate
//! the test opens explicitly, which makes the ordering of completions and
//! page changes deterministic.

use super::*;
use crate::error::{Error, FetchError};
use crate::http::{Transport, TransportResponse};
use crate::types::PageKey;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

type Reply = Result<TransportResponse, FetchError>;

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Default)]
struct GatedTransport {
    gates: Mutex<HashMap<u32, VecDeque<oneshot::Receiver<Reply>>>>,
    requests: Mutex<Vec<Url>>,
}

impl GatedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the next request for `page`; it completes when the sender fires
    fn gate(&self, page: u32) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(rx);
        tx
    }

    fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

/// The page number is always the last query pair
fn page_of(url: &Url) -> u32 {
    url.query_pairs()
        .last()
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Transport for GatedTransport {
    async fn get(&self, url: Url) -> Reply {
        let page = page_of(&url);
        self.requests.lock().unwrap().push(url);
        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front);

        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::network("gate dropped"))),
            None => Err(FetchError::network(format!(
                "no response scripted for page {page}"
            ))),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn ok(body: Value) -> Reply {
    Ok(TransportResponse::json(200, &body))
}

fn status(code: u16) -> Reply {
    Ok(TransportResponse::new(code, "{\"message\":\"error\"}"))
}

fn endpoint() -> PageEndpoint {
    PageEndpoint::parse("https://api.example.com/items").unwrap()
}

fn fetcher(transport: &Arc<GatedTransport>) -> PaginatedFetcher<Value> {
    PaginatedFetcher::new(transport.clone(), endpoint()).unwrap()
}

async fn settle<T: PageData>(fetcher: &PaginatedFetcher<T>) -> PageSnapshot<T> {
    tokio::time::timeout(Duration::from_secs(5), fetcher.settled())
        .await
        .expect("fetcher did not settle")
}

/// Let spawned request tasks run
async fn drain() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Endpoint Tests
// ============================================================================

#[test]
fn test_endpoint_url_for() {
    let endpoint = endpoint();
    assert_eq!(
        endpoint.url_for(PageKey::new(3)).as_str(),
        "https://api.example.com/items?page=3"
    );
}

#[test]
fn test_endpoint_keeps_other_query_params() {
    let endpoint = PageEndpoint::parse("https://api.example.com/items?sort=desc&page=9")
        .unwrap()
        .with_page_param("page");
    assert_eq!(
        endpoint.url_for(PageKey::new(2)).as_str(),
        "https://api.example.com/items?sort=desc&page=2"
    );
}

#[test]
fn test_endpoint_custom_param() {
    let endpoint = endpoint().with_page_param("p");
    assert_eq!(endpoint.page_param(), "p");
    assert_eq!(
        endpoint.url_for(PageKey::new(1)).as_str(),
        "https://api.example.com/items?p=1"
    );
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_outside_runtime_fails() {
    let result = PaginatedFetcher::<Value>::new(GatedTransport::new(), endpoint());
    assert!(matches!(result, Err(Error::Runtime(_))));
}

#[tokio::test]
async fn test_new_is_idle() {
    let transport = GatedTransport::new();
    let fetcher = fetcher(&transport);

    let snapshot = fetcher.snapshot();
    assert_eq!(snapshot, PageSnapshot::initial(PageKey::FIRST));
    assert!(matches!(fetcher.state(), FetchState::Idle));
    assert_eq!(fetcher.stats(), FetcherStats::default());

    drain().await;
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_mount_fetches_first_page() {
    let transport = GatedTransport::new();
    let page_one = transport.gate(1);

    let fetcher: PaginatedFetcher<Value> =
        PaginatedFetcher::mount(transport.clone(), endpoint()).unwrap();

    let snapshot = fetcher.snapshot();
    assert_eq!(snapshot.page, PageKey::FIRST);
    assert!(snapshot.is_fetching);
    assert!(snapshot.data.is_none());
    assert!(snapshot.error.is_none());

    page_one.send(ok(json!({"id": 1}))).unwrap();
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 1})));
    assert!(!snapshot.is_fetching);
    assert!(snapshot.error.is_none());
    assert!(snapshot.is_settled());
    assert_eq!(
        transport.requests()[0].as_str(),
        "https://api.example.com/items?page=1"
    );
}

#[tokio::test]
async fn test_mount_at_custom_page_param() {
    let transport = GatedTransport::new();
    transport.gate(5).send(ok(json!({"page": 5}))).unwrap();

    let fetcher: PaginatedFetcher<Value> = PaginatedFetcher::mount_at(
        transport.clone(),
        endpoint().with_page_param("p"),
        5,
    )
    .unwrap();
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.page, PageKey::new(5));
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"page": 5})));
    assert_eq!(
        transport.requests()[0].as_str(),
        "https://api.example.com/items?p=5"
    );
}

// ============================================================================
// Cache Tests
// ============================================================================

#[tokio::test]
async fn test_cached_page_skips_network() {
    let transport = GatedTransport::new();
    transport.gate(1).send(ok(json!({"id": 1}))).unwrap();
    transport.gate(2).send(ok(json!({"id": 2}))).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(1);
    settle(&fetcher).await;
    fetcher.set_page(2);
    settle(&fetcher).await;

    // Served synchronously, no await in between
    fetcher.set_page(1);
    let snapshot = fetcher.snapshot();
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 1})));
    assert!(!snapshot.is_fetching);
    assert!(snapshot.error.is_none());

    fetcher.set_page(2);
    fetcher.set_page(1);
    drain().await;

    assert_eq!(transport.requests().len(), 2);
    let stats = fetcher.stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.cache_hits, 3);
    assert_eq!(stats.settled, 2);
    assert_eq!(fetcher.cached_pages(), vec![PageKey::new(1), PageKey::new(2)]);
}

#[tokio::test]
async fn test_repeated_same_page_is_idempotent() {
    let transport = GatedTransport::new();
    transport.gate(1).send(ok(json!({"id": 1}))).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(1);
    let first = settle(&fetcher).await;

    for _ in 0..3 {
        fetcher.set_page(1);
        assert_eq!(fetcher.snapshot(), first);
    }
    drain().await;
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_reselecting_in_flight_page_keeps_request() {
    let transport = GatedTransport::new();
    let page_two = transport.gate(2);

    let fetcher = fetcher(&transport);
    let setter = fetcher.setter();
    fetcher.set_page(2);
    drain().await;

    fetcher.set_page(2);
    setter.set(2);
    drain().await;

    assert!(fetcher.is_fetching());
    assert_eq!(fetcher.stats().requests, 1);
    assert_eq!(fetcher.stats().cancelled, 0);

    // The original request is still waiting on its gate
    assert!(page_two.send(ok(json!({"id": 2}))).is_ok());
    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 2})));

    let pages: Vec<u32> = transport.requests().iter().map(page_of).collect();
    assert_eq!(pages, vec![2]);
}

#[tokio::test]
async fn test_reselecting_failed_page_retries() {
    let transport = GatedTransport::new();
    transport.gate(5).send(status(503)).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(5);
    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.error.and_then(|e| e.status()), Some(503));

    transport.gate(5).send(ok(json!({"id": 5}))).unwrap();
    fetcher.set_page(5);
    assert!(fetcher.is_fetching());

    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 5})));
    assert_eq!(fetcher.stats().requests, 2);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_superseded_success_does_not_leak() {
    let transport = GatedTransport::new();
    let page_two = transport.gate(2);
    let page_three = transport.gate(3);

    let fetcher = fetcher(&transport);
    fetcher.set_page(2);
    drain().await;
    fetcher.set_page(3);

    page_three.send(ok(json!({"id": 3}))).unwrap();
    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.page, PageKey::new(3));
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 3})));

    // Late answer for the superseded page
    let _ = page_two.send(ok(json!({"id": 2})));
    drain().await;

    assert_eq!(fetcher.snapshot(), snapshot);
    assert!(!fetcher.is_cached(2));
    assert_eq!(fetcher.stats().cancelled, 1);
}

#[tokio::test]
async fn test_superseded_failure_is_not_surfaced() {
    let transport = GatedTransport::new();
    let page_two = transport.gate(2);
    let page_three = transport.gate(3);

    let fetcher = fetcher(&transport);
    fetcher.set_page(2);
    drain().await;
    fetcher.set_page(3);

    let _ = page_two.send(status(500));
    drain().await;

    let snapshot = fetcher.snapshot();
    assert_eq!(snapshot.page, PageKey::new(3));
    assert!(snapshot.is_fetching);
    assert!(snapshot.error.is_none());

    page_three.send(ok(json!({"id": 3}))).unwrap();
    let snapshot = settle(&fetcher).await;
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 3})));
}

#[tokio::test]
async fn test_never_completing_request_leaves_no_entry() {
    let transport = GatedTransport::new();
    let _page_two = transport.gate(2);
    transport.gate(3).send(ok(json!({"id": 3}))).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(2);
    drain().await;
    fetcher.set_page(3);
    settle(&fetcher).await;

    assert!(!fetcher.is_cached(2));
    assert_eq!(fetcher.cached_pages(), vec![PageKey::new(3)]);
}

#[tokio::test]
async fn test_resolved_response_for_old_epoch_is_discarded() {
    let transport = GatedTransport::new();
    let _page_two = transport.gate(2);
    transport.gate(3).send(ok(json!({"id": 3}))).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(2);
    drain().await;
    let stale = fetcher.current_epoch();

    fetcher.set_page(3);
    let before = settle(&fetcher).await;
    let stats = fetcher.stats();
    let mut rx = fetcher.subscribe();
    let _ = rx.borrow_and_update();

    // Page 2 answered before its abort was observed
    fetcher.resolve(stale, PageKey::new(2), ok(json!({"id": 2})));
    fetcher.resolve(stale, PageKey::new(2), Err(FetchError::network("late failure")));
    fetcher.resolve(stale, PageKey::new(2), status(500));

    assert_eq!(fetcher.snapshot(), before);
    assert!(fetcher.error().is_none());
    assert!(!fetcher.is_cached(2));
    assert_eq!(fetcher.cached_pages(), vec![PageKey::new(3)]);
    assert_eq!(fetcher.stats(), stats);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_resolved_response_after_teardown_is_discarded() {
    let transport = GatedTransport::new();
    let _page_one = transport.gate(1);

    let fetcher = fetcher(&transport);
    fetcher.set_page(1);
    drain().await;
    let epoch = fetcher.current_epoch();

    fetcher.teardown();
    let before = fetcher.snapshot();

    fetcher.resolve(epoch, PageKey::new(1), ok(json!({"id": 1})));
    fetcher.resolve(epoch, PageKey::new(1), Err(FetchError::network("late failure")));

    assert_eq!(fetcher.snapshot(), before);
    assert!(fetcher.is_fetching());
    assert!(!fetcher.is_cached(1));
}

#[tokio::test]
async fn test_change_before_request_starts() {
    let transport = GatedTransport::new();
    transport.gate(3).send(ok(json!({"id": 3}))).unwrap();

    let fetcher = fetcher(&transport);
    // No yield between the two: the first request is aborted before it runs
    fetcher.set_page(2);
    fetcher.set_page(3);
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 3})));
    let pages: Vec<u32> = transport.requests().iter().map(page_of).collect();
    assert_eq!(pages, vec![3]);
}

// ============================================================================
// Error Tests
// ============================================================================

#[tokio::test]
async fn test_http_error_not_cached_and_retried() {
    let transport = GatedTransport::new();
    transport.gate(4).send(status(500)).unwrap();
    transport.gate(1).send(ok(json!({"id": 1}))).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(4);
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.error, Some(FetchError::Http { status: 500 }));
    assert!(snapshot.data.is_none());
    assert!(!snapshot.is_fetching);
    assert!(!fetcher.is_cached(4));

    // Leaving the failed page clears the error
    fetcher.set_page(1);
    settle(&fetcher).await;
    assert!(fetcher.error().is_none());

    // Coming back retries the network
    transport.gate(4).send(ok(json!({"id": 4}))).unwrap();
    fetcher.set_page(4);
    assert!(fetcher.is_fetching());
    assert!(fetcher.error().is_none());

    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 4})));
    assert!(snapshot.error.is_none());

    let pages: Vec<u32> = transport.requests().iter().map(page_of).collect();
    assert_eq!(pages, vec![4, 1, 4]);
    assert_eq!(fetcher.stats().failed, 1);
}

#[tokio::test]
async fn test_network_error_message_verbatim() {
    let transport = GatedTransport::new();
    transport
        .gate(1)
        .send(Err(FetchError::network("connection refused")))
        .unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(1);
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.error, Some(FetchError::network("connection refused")));
    assert_eq!(
        snapshot.error.unwrap().to_string(),
        "connection refused"
    );
    assert!(matches!(fetcher.state(), FetchState::Failed(_)));
}

#[tokio::test]
async fn test_out_of_range_page_uses_error_path() {
    let transport = GatedTransport::new();
    transport.gate(0).send(status(404)).unwrap();

    let fetcher = fetcher(&transport);
    fetcher.set_page(0);
    let snapshot = settle(&fetcher).await;

    assert_eq!(snapshot.page, PageKey::new(0));
    assert_eq!(snapshot.error.and_then(|e| e.status()), Some(404));
    assert_eq!(
        transport.requests()[0].as_str(),
        "https://api.example.com/items?page=0"
    );
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
}

#[tokio::test]
async fn test_typed_results_and_decode_errors() {
    let transport = GatedTransport::new();
    transport.gate(1).send(ok(json!({"id": 7}))).unwrap();
    transport.gate(2).send(ok(json!({"name": "no id"}))).unwrap();

    let fetcher: PaginatedFetcher<Item> =
        PaginatedFetcher::mount(transport.clone(), endpoint()).unwrap();
    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.data.as_deref(), Some(&Item { id: 7 }));

    fetcher.set_page(2);
    let snapshot = settle(&fetcher).await;
    assert!(matches!(snapshot.error, Some(FetchError::Decode { .. })));
    assert!(!fetcher.is_cached(2));
}

// ============================================================================
// Teardown Tests
// ============================================================================

#[tokio::test]
async fn test_teardown_mid_fetch_freezes_state() {
    let transport = GatedTransport::new();
    let page_one = transport.gate(1);

    let fetcher = fetcher(&transport);
    let mut rx = fetcher.subscribe();
    fetcher.set_page(1);
    drain().await;

    let before = fetcher.snapshot();
    assert!(before.is_fetching);

    fetcher.teardown();
    assert!(fetcher.is_torn_down());

    let _ = page_one.send(ok(json!({"id": 1})));
    drain().await;

    assert_eq!(fetcher.snapshot(), before);
    assert!(!fetcher.is_cached(1));
    assert_eq!(*rx.borrow_and_update(), before);
    assert!(rx.changed().await.is_err());

    // Page changes after teardown are ignored
    fetcher.set_page(2);
    assert_eq!(fetcher.page(), PageKey::FIRST);
    assert_eq!(fetcher.stats().requests, 1);
    assert_eq!(fetcher.stats().cancelled, 1);

    // Does not wait for the abandoned request
    assert_eq!(settle(&fetcher).await, before);
}

#[tokio::test]
async fn test_drop_detaches_setter() {
    let transport = GatedTransport::new();
    let page_one = transport.gate(1);

    let fetcher = fetcher(&transport);
    let setter = fetcher.setter();
    let rx = fetcher.subscribe();
    fetcher.set_page(1);
    drain().await;
    assert!(setter.is_attached());

    drop(fetcher);
    let _ = page_one.send(ok(json!({"id": 1})));
    drain().await;

    assert!(!setter.is_attached());
    setter.set(2);
    assert!(rx.has_changed().is_err());
    assert!(rx.borrow().is_fetching);
}

// ============================================================================
// Setter & Subscription Tests
// ============================================================================

#[tokio::test]
async fn test_setter_and_functional_updates() {
    let transport = GatedTransport::new();
    for page in 1..=3 {
        transport.gate(page).send(ok(json!({"page": page}))).unwrap();
    }

    let fetcher = fetcher(&transport);
    let setter = fetcher.setter();

    setter.set(1);
    settle(&fetcher).await;

    setter.update(PageKey::next);
    assert_eq!(fetcher.page(), PageKey::new(2));
    settle(&fetcher).await;

    fetcher.set_page_with(|page| page.next());
    let snapshot = settle(&fetcher).await;
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"page": 3})));

    setter.clone().update(PageKey::prev);
    assert_eq!(fetcher.page(), PageKey::new(2));
    assert!(!fetcher.is_fetching());
}

#[tokio::test]
async fn test_subscribe_sees_each_transition() {
    let transport = GatedTransport::new();
    let page_one = transport.gate(1);

    let fetcher = fetcher(&transport);
    let mut rx = fetcher.subscribe();

    fetcher.set_page(1);
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_fetching);

    page_one.send(ok(json!({"id": 1}))).unwrap();
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .unwrap()
        .unwrap();

    let snapshot = rx.borrow_and_update().clone();
    assert!(!snapshot.is_fetching);
    assert_eq!(snapshot.data.as_deref(), Some(&json!({"id": 1})));
}
