//! HTTP client module
//!
//! Provides the Graph HTTP client with retry, rate limiting, and backoff.
//!
//! # Features
//!
//! - **Automatic Retries**: 429 honours `Retry-After`, 5xx and timeouts back off
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Authentication**: Bearer tokens from the auth module, refreshed on 401
//! - **Provider Errors**: OData error bodies become [`crate::Error::Provider`]

mod client;
mod rate_limit;

pub use client::{provider_error, HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
