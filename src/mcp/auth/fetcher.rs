//! OAuth client-credentials exchange against a tenant's token endpoint.
//!
//! Wire contract: the form body carries exactly `grant_type`, `scope`,
//! `client_id` and `client_secret`. The tenant api key travels only in the
//! `X-Keka-APIKey` header and never in the body.

use std::time::Duration;

use oauth2::{AccessToken, TokenUrl};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{info, warn};

use super::{cache::CachedToken, credentials::TenantCredentials, urls::KekaHosts};
use crate::mcp::error::AuthError;

pub const API_KEY_HEADER: &str = "X-Keka-APIKey";

/// Upstream error bodies are cut to this many characters before they are
/// attached to an error.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenFetcher {
    client: ClientWithMiddleware,
    hosts: KekaHosts,
    timeout: Duration,
}

impl TokenFetcher {
    /// `timeout` must match the one `client` was built with; it is only used
    /// to report [`AuthError::Timeout`].
    pub const fn new(client: ClientWithMiddleware, hosts: KekaHosts, timeout: Duration) -> Self {
        Self {
            client,
            hosts,
            timeout,
        }
    }

    pub const fn hosts(&self) -> &KekaHosts {
        &self.hosts
    }

    /// Exchanges the tenant's client credentials for a bearer token.
    ///
    /// A single attempt is made; retry policy belongs to the caller, who can
    /// consult [`AuthError::is_retryable`].
    ///
    /// # Errors
    ///
    /// * `InvalidEndpoint` - the composed token URL does not parse
    /// * `Timeout` - no response within the client timeout
    /// * `Network` - any other transport failure
    /// * `TokenAcquisition` - non-2xx status, unparseable body, or no `access_token`
    pub async fn fetch_token(
        &self,
        credentials: &TenantCredentials,
    ) -> Result<CachedToken, AuthError> {
        let token_url = TokenUrl::new(self.hosts.token_url(credentials))
            .map_err(|e| AuthError::InvalidEndpoint(e.to_string()))?;
        let tenant = credentials.tenant_key();

        let form = [
            ("grant_type", credentials.grant_type()),
            ("scope", credentials.scope()),
            ("client_id", credentials.client_id().as_str()),
            ("client_secret", credentials.client_secret().secret().as_str()),
        ];

        let response = self
            .client
            .post(token_url.url().clone())
            .header(header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, credentials.api_key().secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(reqwest_middleware::Error::Reqwest(e)))?;

        if !status.is_success() {
            warn!(%tenant, %status, "token endpoint rejected the request");
            return Err(AuthError::TokenAcquisition {
                status,
                detail: truncate(&body),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::TokenAcquisition {
                status,
                detail: format!("invalid token response: {e}"),
            })?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::TokenAcquisition {
                status,
                detail: "no access_token in response".to_string(),
            })?;

        info!(
            %tenant,
            token_type = parsed.token_type.as_deref().unwrap_or("unspecified"),
            expires_in = ?parsed.expires_in,
            "acquired access token"
        );

        let cached = CachedToken::new(AccessToken::new(access_token));
        Ok(match parsed.expires_in {
            Some(seconds) => cached.expiring_in(seconds),
            None => cached,
        })
    }

    fn classify(&self, err: reqwest_middleware::Error) -> AuthError {
        match &err {
            reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => {
                AuthError::Timeout(self.timeout)
            }
            _ => AuthError::Network(err),
        }
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}
