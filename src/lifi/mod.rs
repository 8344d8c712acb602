//! Upstream LI.FI REST access: transport, rate limiting, retries and the
//! chain directory cache.

pub mod chains;
pub mod client;
pub mod rate_limiter;
pub mod transport;

pub use chains::{ChainCache, ChainCacheError, ChainRecord};
pub use client::{HttpClient, HttpError, RetryPolicy};
pub use rate_limiter::RateLimiter;
