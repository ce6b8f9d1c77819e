//! Tenant URL composition. Pure string building, no I/O.

use super::credentials::TenantCredentials;

/// Domain appended after `{company}.{environment}` when nothing else is configured.
pub const DEFAULT_DOMAIN: &str = "com";

/// `https://{company}.{environment}.{domain}/api/v1`
pub fn build_base_url(credentials: &TenantCredentials, domain: &str) -> String {
    format!(
        "https://{}.{}.{domain}/api/v1",
        credentials.company(),
        credentials.environment()
    )
}

/// `https://login.{environment}.{domain}/connect/token`
pub fn token_endpoint(credentials: &TenantCredentials, domain: &str) -> String {
    format!(
        "https://login.{}.{domain}/connect/token",
        credentials.environment()
    )
}

/// Where tenant API and token requests are sent.
///
/// The overrides replace the composed URLs entirely; they exist for
/// corporate proxies and for pointing the gateway at a local mock.
#[derive(Debug, Clone)]
pub struct KekaHosts {
    pub domain: String,
    pub api_base_override: Option<String>,
    pub token_url_override: Option<String>,
}

impl Default for KekaHosts {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            api_base_override: None,
            token_url_override: None,
        }
    }
}

impl KekaHosts {
    /// Routes both API and token traffic to a single fixed origin.
    pub fn fixed(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            api_base_override: Some(format!("{origin}/api/v1")),
            token_url_override: Some(format!("{origin}/connect/token")),
        }
    }

    pub fn api_base_url(&self, credentials: &TenantCredentials) -> String {
        self.api_base_override.as_ref().map_or_else(
            || build_base_url(credentials, &self.domain),
            |base| base.trim_end_matches('/').to_string(),
        )
    }

    pub fn token_url(&self, credentials: &TenantCredentials) -> String {
        self.token_url_override
            .clone()
            .unwrap_or_else(|| token_endpoint(credentials, &self.domain))
    }
}
