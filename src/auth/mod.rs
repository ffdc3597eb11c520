//! Authentication module
//!
//! Supports: Bearer, Basic, API Key (header or query)
//!
//! Credentials come from the validated configuration and are applied to
//! each page request by the HTTP transport.

mod types;

pub use types::{Credentials, Location};
