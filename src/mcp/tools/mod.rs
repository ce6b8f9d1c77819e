//! MCP tools for interacting with the Keka API.
//!
//! Each module implements a group of tools:
//! - `employees`: Core HR lookups (employees, departments)
//! - `leave`: Leave types, balances and requests
//! - `admin`: Connectivity check and token cache maintenance
//!
//! All tools share a [`KekaGateway`] and resolve the calling tenant's
//! credentials per request with [`credentials_for`].

pub mod admin;
pub mod employees;
pub mod leave;

use std::{collections::HashMap, sync::Arc};

use axum::http::{header::AUTHORIZATION, request};
use reqwest_middleware::ClientWithMiddleware;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
};
use serde_json::{Value, json};
use tracing::warn;

use crate::mcp::{
    auth::{
        BearerCredentials, CredentialSource, EnvSource, Fallback, TenantCredentials,
        TokenProvider,
        credentials::{GRANT_TYPE, SCOPE},
    },
    error::{AuthError, KekaError},
    http::{DEFAULT_GRANT_TYPE, DEFAULT_SCOPE, Method, keka_api_call},
};

pub const DEFAULT_PAGE_NUMBER: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Everything a tool needs to reach the Keka API.
#[derive(Debug, Clone)]
pub struct KekaGateway {
    client: ClientWithMiddleware,
    provider: Arc<TokenProvider>,
}

impl KekaGateway {
    pub const fn new(client: ClientWithMiddleware, provider: Arc<TokenProvider>) -> Self {
        Self { client, provider }
    }

    pub fn provider(&self) -> &TokenProvider {
        &self.provider
    }

    pub async fn get(
        &self,
        credentials: &TenantCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, KekaError> {
        keka_api_call(
            &self.client,
            &self.provider,
            credentials,
            Method::GET,
            path,
            query,
            None,
        )
        .await
    }

    pub async fn post(
        &self,
        credentials: &TenantCredentials,
        path: &str,
        body: &Value,
    ) -> Result<Value, KekaError> {
        keka_api_call(
            &self.client,
            &self.provider,
            credentials,
            Method::POST,
            path,
            &[],
            Some(body),
        )
        .await
    }
}

/// Where a tool call's tenant fields come from.
///
/// A bearer header is taken as a whole: a header missing a tenant field is
/// reported incomplete and never completed from the server's environment.
/// Only grant type and scope, which are not tenant secrets, fall back to the
/// environment and then to the integration defaults.
#[derive(Debug)]
pub enum TenantSource<E> {
    Header(Fallback<BearerCredentials, HashMap<String, String>>),
    Environment(Fallback<E, HashMap<String, String>>),
}

impl<E: CredentialSource> CredentialSource for TenantSource<E> {
    fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Header(source) => source.get(key),
            Self::Environment(source) => source.get(key),
        }
    }
}

fn tenant_source_from<E: CredentialSource>(
    bearer: Option<BearerCredentials>,
    environment: E,
) -> TenantSource<E> {
    let defaults: HashMap<String, String> =
        [(GRANT_TYPE, &*DEFAULT_GRANT_TYPE), (SCOPE, &*DEFAULT_SCOPE)]
            .into_iter()
            .map(|(key, default)| {
                let value = environment
                    .get(key)
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| default.clone());
                (key.to_string(), value)
            })
            .collect();

    match bearer {
        Some(header) => TenantSource::Header(Fallback {
            primary: header,
            fallback: defaults,
        }),
        None => TenantSource::Environment(Fallback {
            primary: environment,
            fallback: defaults,
        }),
    }
}

/// The credential source for the current HTTP request: its five-field bearer
/// header when present, otherwise the process environment.
pub fn tenant_source(parts: Option<&request::Parts>) -> TenantSource<EnvSource> {
    let bearer = parts
        .and_then(|p| p.headers.get(AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .and_then(BearerCredentials::parse);
    tenant_source_from(bearer, EnvSource)
}

/// Resolves the calling tenant's credentials from [`tenant_source`].
///
/// # Errors
///
/// [`AuthError::Configuration`] naming every key the source lacks, or
/// [`AuthError::InvalidTenant`] for a malformed company or environment.
pub fn credentials_for(parts: Option<&request::Parts>) -> Result<TenantCredentials, AuthError> {
    TenantCredentials::resolve(&tenant_source(parts))
}

/// Turns an API result into tool output.
///
/// Invalid arguments are protocol errors. Everything else, including auth
/// and upstream failures, becomes tool output flagged as an error so the
/// agent can read the message.
pub fn respond(
    result: Result<Value, KekaError>,
    action: &str,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) if value.is_object() => Ok(CallToolResult::structured(value)),
        Ok(value) => Ok(CallToolResult::structured(json!({ "data": value }))),
        Err(KekaError::InvalidParams(msg)) => Err(KekaError::InvalidParams(msg).into()),
        Err(err) => {
            warn!(action, error = %err, "tool call failed");
            Ok(CallToolResult::error(vec![Content::text(format!(
                "Error {action}: {err}"
            ))]))
        }
    }
}

/// Query parameters in Keka's camelCase naming, skipping unset values.
#[derive(Debug, Default)]
pub struct Query(Vec<(&'static str, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn opt(mut self, key: &'static str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            let value = value.to_string();
            if !value.trim().is_empty() {
                self.0.push((key, value));
            }
        }
        self
    }

    /// Appends `pageNumber` and `pageSize`, defaulting to 1 and 100 and
    /// clamping the size to the API maximum.
    ///
    /// # Errors
    ///
    /// `InvalidParams` when either value is zero.
    pub fn paged(
        mut self,
        page_number: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Self, KekaError> {
        let page_number = page_number.unwrap_or(DEFAULT_PAGE_NUMBER);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_number == 0 || page_size == 0 {
            return Err(KekaError::InvalidParams(
                "page_number and page_size must be at least 1".to_string(),
            ));
        }
        self.0.push(("pageNumber", page_number.to_string()));
        self.0.push(("pageSize", page_size.min(MAX_PAGE_SIZE).to_string()));
        Ok(self)
    }

    pub fn as_slice(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_with(authorization: &str) -> request::Parts {
        let (parts, ()) = axum::http::Request::builder()
            .header(AUTHORIZATION, authorization)
            .body(())
            .expect("request")
            .into_parts();
        parts
    }

    #[test]
    fn bearer_header_supplies_tenant_fields() {
        let parts = parts_with("Bearer acme:prod:cid:csecret:akey");
        let creds = credentials_for(Some(&parts)).expect("credentials");

        assert_eq!(creds.company(), "acme");
        assert_eq!(creds.environment(), "prod");
        assert_eq!(creds.client_id().as_str(), "cid");
        assert_eq!(creds.api_key().secret(), "akey");
        assert!(!creds.grant_type().is_empty());
        assert!(!creds.scope().is_empty());
    }

    fn operator_environment() -> HashMap<String, String> {
        [
            ("COMPANY", "operator"),
            ("ENVIRONMENT", "prod"),
            ("GRANT_TYPE", "operator-grant"),
            ("CLIENT_ID", "operator-client"),
            ("CLIENT_SECRET", "operator-secret"),
            ("API_KEY", "operator-apikey"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn partial_bearer_header_never_borrows_environment_secrets() {
        let header = BearerCredentials::parse("Bearer victim:attacker-controlled").expect("bearer");
        let source = tenant_source_from(Some(header), operator_environment());

        assert_eq!(source.get("CLIENT_SECRET"), None);
        assert_eq!(source.get("API_KEY"), None);
        match TenantCredentials::resolve(&source) {
            Err(AuthError::Configuration { missing }) => {
                assert_eq!(missing, vec!["CLIENT_ID", "CLIENT_SECRET", "API_KEY"]);
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn bearer_header_takes_grant_type_from_environment_and_scope_from_defaults() {
        let header = BearerCredentials::parse("Bearer acme:prod:cid:csecret:akey").expect("bearer");
        let creds = TenantCredentials::resolve(&tenant_source_from(
            Some(header),
            operator_environment(),
        ))
        .expect("credentials");

        assert_eq!(creds.company(), "acme");
        assert_eq!(creds.client_secret().secret(), "csecret");
        assert_eq!(creds.grant_type(), "operator-grant");
        assert_eq!(creds.scope(), DEFAULT_SCOPE.as_str());
    }

    #[test]
    fn without_header_the_environment_supplies_everything() {
        let creds = TenantCredentials::resolve(&tenant_source_from(None, operator_environment()))
            .expect("credentials");
        assert_eq!(creds.company(), "operator");
        assert_eq!(creds.api_key().secret(), "operator-apikey");
        assert_eq!(creds.scope(), DEFAULT_SCOPE.as_str());
    }

    #[test]
    fn header_with_url_characters_is_rejected() {
        let parts = parts_with("Bearer evil.example/x?:kekademo:c:s:k");
        match credentials_for(Some(&parts)) {
            Err(AuthError::InvalidTenant { key }) => assert_eq!(key, "COMPANY"),
            other => panic!("expected invalid tenant, got {other:?}"),
        }
    }

    #[test]
    fn paging_defaults_and_clamps() {
        let query = Query::new().paged(None, Some(500)).expect("paging");
        assert_eq!(
            query.as_slice(),
            &[("pageNumber", "1".to_string()), ("pageSize", "200".to_string())]
        );
        assert!(Query::new().paged(Some(0), None).is_err());
    }

    #[test]
    fn query_skips_unset_and_blank_values() {
        let query = Query::new()
            .opt("employeeIds", Some("a,b"))
            .opt("leaveTypeIds", None::<String>)
            .opt("from", Some("  "));
        assert_eq!(query.as_slice(), &[("employeeIds", "a,b".to_string())]);
    }

    #[test]
    fn failures_become_flagged_tool_output() {
        let result = respond(
            Err(KekaError::Auth(AuthError::Configuration {
                missing: vec!["COMPANY"],
            })),
            "fetching employees",
        )
        .expect("tool output");
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn invalid_params_stay_protocol_errors() {
        let result = respond(
            Err(KekaError::InvalidParams("id cannot be empty".to_string())),
            "fetching employee",
        );
        assert!(result.is_err());
    }

    #[test]
    fn arrays_are_wrapped_for_structured_output() {
        let result = respond(Ok(json!([1, 2])), "listing").expect("tool output");
        assert_eq!(result.structured_content, Some(json!({ "data": [1, 2] })));
    }
}
