//! HTTP client configuration and shared API call functionality for Keka.
//!
//! This module provides:
//! - Environment-based process settings (domain, overrides, timeout)
//! - Shared HTTP client with an explicit timeout and request tracing
//! - Common API call function used by all tools
//!
//! Tenant credentials are deliberately absent from the statics below. They
//! are resolved per request and passed in explicitly.

use std::{env, sync::LazyLock, time::Duration};

use http::Extensions;
use reqwest::{Method, Request, Response, StatusCode, header};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Result as MiddlewareResult};
use reqwest_tracing::{
    ReqwestOtelSpanBackend, TracingMiddleware, default_on_request_end, reqwest_otel_span,
};
use serde_json::Value;
use tracing::{Span, warn};

use crate::mcp::{
    auth::{KekaHosts, TenantCredentials, TokenProvider, urls::DEFAULT_DOMAIN},
    error::KekaError,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Load configuration from environment variables
pub static KEKA_DOMAIN: LazyLock<String> =
    LazyLock::new(|| env::var("KEKA_DOMAIN").unwrap_or_else(|_| DEFAULT_DOMAIN.to_string()));

pub static KEKA_API_BASE_URL: LazyLock<Option<String>> =
    LazyLock::new(|| env::var("KEKA_API_BASE_URL").ok().filter(|v| !v.is_empty()));

pub static KEKA_TOKEN_URL: LazyLock<Option<String>> =
    LazyLock::new(|| env::var("KEKA_TOKEN_URL").ok().filter(|v| !v.is_empty()));

pub static KEKA_HTTP_TIMEOUT: LazyLock<Duration> = LazyLock::new(|| {
    let secs = env::var("KEKA_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
});

pub static DEFAULT_GRANT_TYPE: LazyLock<String> =
    LazyLock::new(|| env::var("DEFAULT_GRANT_TYPE").unwrap_or_else(|_| "kekaapi".to_string()));

pub static DEFAULT_SCOPE: LazyLock<String> =
    LazyLock::new(|| env::var("DEFAULT_SCOPE").unwrap_or_else(|_| "kekaapi".to_string()));

/// Hosts as configured through the environment.
pub fn hosts_from_env() -> KekaHosts {
    KekaHosts {
        domain: KEKA_DOMAIN.clone(),
        api_base_override: KEKA_API_BASE_URL.clone(),
        token_url_override: KEKA_TOKEN_URL.clone(),
    }
}

// Custom Tracing Backend for Reqwest.
// Only method and url are recorded: bodies carry client secrets and headers
// carry api keys and bearer tokens.
// Used only as a type parameter of TracingMiddleware, never constructed.
#[allow(dead_code)]
struct KekaTracing;

impl ReqwestOtelSpanBackend for KekaTracing {
    fn on_request_start(req: &Request, _extension: &mut Extensions) -> Span {
        reqwest_otel_span!(name = "keka-api-request", req)
    }

    fn on_request_end(
        span: &Span,
        outcome: &MiddlewareResult<Response>,
        _extension: &mut Extensions,
    ) {
        default_on_request_end(span, outcome);
    }
}

/// Builds the shared traced client. Every request is bounded by `timeout`.
///
/// # Errors
///
/// Returns `KekaError::Http` if the TLS backend cannot be initialised.
pub fn build_http_client(timeout: Duration) -> Result<ClientWithMiddleware, KekaError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(ClientBuilder::new(client)
        .with(TracingMiddleware::<KekaTracing>::new())
        .build())
}

/// Makes an authenticated request to the Keka REST API.
///
/// # Arguments
/// * `provider` - Token provider; the tenant's token is taken from its cache
///   or fetched on a miss
/// * `credentials` - The calling tenant's credentials
/// * `method` - HTTP method (GET, POST, PUT)
/// * `path` - Path below the tenant's `/api/v1` root, e.g. `/hris/employees`
/// * `query` - Query parameters, appended in order
/// * `body` - Optional JSON body for POST and PUT requests
///
/// # Returns
/// A Result containing either:
/// * `Ok(Value)` - JSON response from the API (`null` for an empty body)
/// * `Err(KekaError)` - Error details if the request fails
///
/// # Errors
/// * `Auth` - Token acquisition failed
/// * `InvalidParams` - Unsupported HTTP method
/// * `Upstream` - The API answered with a non-2xx status
/// * `HttpMiddleware` / `Http` - Network failures
/// * `Serialization` - JSON parsing errors
///
/// A 401 from the API drops the tenant's cached token, unless another caller
/// already replaced it, so the next call acquires a fresh one.
pub async fn keka_api_call(
    client: &ClientWithMiddleware,
    provider: &TokenProvider,
    credentials: &TenantCredentials,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<&Value>,
) -> Result<Value, KekaError> {
    if !matches!(method, Method::GET | Method::POST | Method::PUT) {
        return Err(KekaError::InvalidParams("Unsupported HTTP method".to_string()));
    }

    let token = provider.get_auth_token(credentials).await?;
    let url = format!("{}{path}", provider.api_base_url(credentials));

    let mut request_builder = client
        .request(method.clone(), &url)
        .bearer_auth(token.secret())
        .header(header::ACCEPT, "application/json");

    if !query.is_empty() {
        request_builder = request_builder.query(query);
    }

    if let Some(body) = body {
        request_builder = request_builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?);
    }

    let response = request_builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        if status == StatusCode::UNAUTHORIZED {
            warn!(tenant = %credentials.tenant_key(), "api rejected bearer token");
            provider.invalidate(credentials, &token);
        }
        return Err(KekaError::Upstream {
            method,
            url,
            status,
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
