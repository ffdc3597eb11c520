//! Request pacing
//!
//! One unkeyed governor bucket per transport, shared by every page request
//! it sends. A paced request is delayed, never failed or retried.

use crate::error::{Error, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Pacing settings, as written under `http.rate_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Sustained page requests per second
    pub requests_per_second: u32,
    /// Requests allowed back to back; defaults to `requests_per_second`
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl RateLimiterConfig {
    /// Pacing with an explicit burst
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size: Some(burst_size),
        }
    }

    /// Pacing whose burst equals the per-second rate
    pub fn per_second(requests_per_second: u32) -> Self {
        Self {
            requests_per_second,
            burst_size: None,
        }
    }

    /// Effective burst size
    pub fn burst(&self) -> u32 {
        self.burst_size.unwrap_or(self.requests_per_second)
    }

    /// Reject settings that would stall every request
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_second == 0 {
            return Err(Error::invalid_value(
                "http.rate_limit.requests_per_second",
                "must be greater than zero",
            ));
        }
        if self.burst_size == Some(0) {
            return Err(Error::invalid_value(
                "http.rate_limit.burst_size",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn quota(&self) -> Quota {
        // Unvalidated zeros degrade to one request per second
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst()).unwrap_or(rate);
        Quota::per_second(rate).allow_burst(burst)
    }
}

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token bucket shared by clones of one transport
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
            config: *config,
        }
    }

    /// Take a permit, sleeping until one is free
    pub async fn wait(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        debug!(
            "Pacing request ({} req/s, burst {})",
            self.config.requests_per_second,
            self.config.burst()
        );
        self.limiter.until_ready().await;
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
