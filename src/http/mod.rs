//! HTTP client module
//!
//! Provides the HTTP client used against the vendor API.
//!
//! # Features
//!
//! - **Basic Authentication**: access/secret key pair on every request
//! - **Request Pacing**: fixed spacing between requests using governor
//! - **Status Classification**: non-success responses become `Error::HttpStatus`

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
