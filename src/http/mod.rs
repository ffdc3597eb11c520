//! HTTP transport module
//!
//! Provides the transport the fetcher issues page requests through.
//!
//! # Features
//!
//! - **Transport trait**: a cancellable GET, easy to replace in tests
//! - **HttpTransport**: reqwest implementation with credentials and headers
//! - **Rate Limiting**: optional token bucket pacing using governor

mod client;
mod rate_limit;
mod transport;

pub use client::{default_user_agent, HttpTransport, HttpTransportConfig, HttpTransportConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{Transport, TransportResponse};
