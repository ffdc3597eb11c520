//! Write-once page cache

use crate::types::PageKey;
use std::collections::HashMap;
use std::sync::Arc;

/// Results keyed by page
///
/// An entry is final once written: it is never replaced or evicted for the
/// lifetime of the owning fetcher.
#[derive(Debug)]
pub struct PageCache<T> {
    pages: HashMap<PageKey, Arc<T>>,
}

impl<T> PageCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    /// Cached result for a page
    pub fn get(&self, page: PageKey) -> Option<Arc<T>> {
        self.pages.get(&page).cloned()
    }

    /// Whether a page is cached
    pub fn contains(&self, page: PageKey) -> bool {
        self.pages.contains_key(&page)
    }

    /// Store a result, keeping any existing entry
    ///
    /// Returns the entry now in the cache.
    pub fn insert(&mut self, page: PageKey, value: Arc<T>) -> Arc<T> {
        Arc::clone(self.pages.entry(page).or_insert(value))
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Cached page keys in ascending order
    pub fn pages(&self) -> Vec<PageKey> {
        let mut keys: Vec<PageKey> = self.pages.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
