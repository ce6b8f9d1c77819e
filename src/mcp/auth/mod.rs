//! Tenant-scoped OAuth token provider for the Keka API.
//!
//! The pieces, leaf first:
//!
//! - `credentials`: resolves and validates a tenant's OAuth identity
//! - `urls`: derives the tenant API root and token endpoint
//! - `fetcher`: performs the client-credentials exchange
//! - `cache`: memoizes tokens per tenant with single-flight fetching
//!
//! [`TokenProvider`] glues them together behind `get_auth_token`, which every
//! tool calls before issuing its own request with `Authorization: Bearer`.

pub mod cache;
pub mod credentials;
pub mod fetcher;
pub mod urls;

use oauth2::AccessToken;
use tracing::{debug, info};

pub use cache::{CachedToken, TokenCache};
pub use credentials::{
    BearerCredentials, ClientFingerprint, CredentialSource, EnvSource, Fallback,
    TenantCredentials, TenantKey,
};
pub use fetcher::TokenFetcher;
pub use urls::KekaHosts;

use crate::mcp::error::AuthError;

#[derive(Debug)]
pub struct TokenProvider {
    fetcher: TokenFetcher,
    cache: TokenCache,
}

impl TokenProvider {
    pub fn new(fetcher: TokenFetcher) -> Self {
        Self {
            fetcher,
            cache: TokenCache::new(),
        }
    }

    /// Returns a bearer token for the tenant, fetching one only when the
    /// cache has nothing usable for these client credentials.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] raised by the token exchange.
    pub async fn get_auth_token(
        &self,
        credentials: &TenantCredentials,
    ) -> Result<AccessToken, AuthError> {
        let tenant = credentials.tenant_key();
        let owner = credentials.fingerprint();
        let cached = self
            .cache
            .get_or_fetch(&tenant, &owner, || self.fetcher.fetch_token(credentials))
            .await?;
        Ok(cached.token)
    }

    pub fn api_base_url(&self, credentials: &TenantCredentials) -> String {
        self.fetcher.hosts().api_base_url(credentials)
    }

    /// Forgets a token the API rejected so the next call refetches it.
    pub fn invalidate(&self, credentials: &TenantCredentials, rejected: &AccessToken) -> bool {
        let tenant = credentials.tenant_key();
        let removed = self.cache.invalidate(&tenant, rejected);
        debug!(%tenant, removed, "invalidated cached token");
        removed
    }

    /// Drops every cached token. Returns how many tenants were cleared.
    pub fn clear_token_cache(&self) -> usize {
        let cleared = self.cache.len();
        self.cache.clear();
        info!(cleared, "token cache cleared");
        cleared
    }

    pub fn cached_tenants(&self) -> usize {
        self.cache.len()
    }
}
