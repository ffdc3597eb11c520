//! Common types used throughout paged-fetch
//!
//! This module contains shared type definitions and type aliases
//! used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Page Key
// ============================================================================

/// Identifies one page of a paginated resource
///
/// Pages start at 1. Any value may be requested; bounds are the remote
/// endpoint's business and come back as an HTTP error if exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(u32);

impl PageKey {
    /// The page a fetcher starts on
    pub const FIRST: PageKey = PageKey(1);

    /// Create a page key
    pub const fn new(page: u32) -> Self {
        Self(page)
    }

    /// Raw page number
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The following page
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The preceding page, never below [`PageKey::FIRST`]
    #[must_use]
    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::FIRST.0))
    }
}

impl Default for PageKey {
    fn default() -> Self {
        Self::FIRST
    }
}

impl From<u32> for PageKey {
    fn from(page: u32) -> Self {
        Self(page)
    }
}

impl From<PageKey> for u32 {
    fn from(page: PageKey) -> Self {
        page.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_page_key_default_is_first() {
        assert_eq!(PageKey::default(), PageKey::FIRST);
        assert_eq!(PageKey::FIRST.get(), 1);
    }

    #[test_case(1, 2 ; "first page")]
    #[test_case(41, 42 ; "middle page")]
    #[test_case(u32::MAX, u32::MAX ; "saturates at max")]
    fn test_page_key_next(from: u32, expected: u32) {
        assert_eq!(PageKey::new(from).next(), PageKey::new(expected));
    }

    #[test_case(5, 4 ; "middle page")]
    #[test_case(2, 1 ; "second page")]
    #[test_case(1, 1 ; "stays on first")]
    #[test_case(0, 1 ; "zero clamps to first")]
    fn test_page_key_prev(from: u32, expected: u32) {
        assert_eq!(PageKey::new(from).prev(), PageKey::new(expected));
    }

    #[test]
    fn test_page_key_display_and_serde() {
        let page = PageKey::from(7);
        assert_eq!(page.to_string(), "7");
        assert_eq!(serde_json::to_string(&page).unwrap(), "7");
        let parsed: PageKey = serde_json::from_str("12").unwrap();
        assert_eq!(u32::from(parsed), 12);
    }
}
