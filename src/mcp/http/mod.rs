//! HTTP client and API communication layer for Keka.
//!
//! This module handles all HTTP communication with Keka's REST API,
//! including process settings, request construction, and response handling.

mod client;

// Re-export client's public API
pub use client::{
    DEFAULT_GRANT_TYPE, DEFAULT_SCOPE, KEKA_HTTP_TIMEOUT, build_http_client, hosts_from_env,
    keka_api_call,
};

// Re-export common types used in our public API
pub use reqwest::Method;
