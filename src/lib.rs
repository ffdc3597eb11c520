// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # paged-fetch
//!
//! Page-keyed, cancellable fetching of paginated HTTP resources.
//!
//! ## Features
//!
//! - **Page Cache**: every page is fetched at most once per fetcher instance
//! - **Cancellation**: a page change aborts the request it supersedes
//! - **Last Epoch Wins**: late answers to superseded requests are dropped
//! - **Observable State**: `{ data, is_fetching, error }` snapshots and a watch channel
//! - **Eager Config Validation**: YAML, JSON or environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paged_fetch::{FetcherConfig, PaginatedFetcher, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FetcherConfig::from_env()?;
//!     let fetcher: PaginatedFetcher<serde_json::Value> = PaginatedFetcher::from_config(&config)?;
//!
//!     let first = fetcher.settled().await;
//!     println!("{:?}", first.data);
//!
//!     fetcher.set_page(2);
//!     let second = fetcher.settled().await;
//!     println!("{:?} {:?}", second.data, second.error);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    PaginatedFetcher                      │
//! │  set_page() → fetch cycle     snapshot() / subscribe()   │
//! └──────────────────────────────────────────────────────────┘
//!        │                  │                    │
//! ┌──────┴──────┐   ┌───────┴───────┐   ┌────────┴────────┐
//! │  PageCache  │   │ EpochTracker  │   │    Transport    │
//! ├─────────────┤   ├───────────────┤   ├─────────────────┤
//! │ write-once  │   │ abort handle  │   │ HttpTransport   │
//! │ Arc<T>      │   │ stale guard   │   │ auth, pacing    │
//! └─────────────┘   └───────────────┘   └─────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credentials
pub mod auth;

/// HTTP transport
pub mod http;

/// Paginated fetcher, page cache and request epochs
pub mod fetcher;

/// Configuration loading and validation
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigFile, FetcherConfig};
pub use error::{Error, FetchError, Result};
pub use fetcher::{FetchState, PageEndpoint, PageSetter, PageSnapshot, PaginatedFetcher};
pub use http::{HttpTransport, Transport, TransportResponse};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
