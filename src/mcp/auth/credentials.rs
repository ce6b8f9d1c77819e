//! Tenant credential resolution.
//!
//! Credentials are resolved once per incoming request from a
//! [`CredentialSource`] and then passed explicitly down the call chain.
//! Nothing here is stored in process-wide state.

use std::{collections::HashMap, env, fmt};

use oauth2::{ClientId, ClientSecret};
use sha2::{Digest, Sha256};

use crate::mcp::error::AuthError;

pub const COMPANY: &str = "COMPANY";
pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const GRANT_TYPE: &str = "GRANT_TYPE";
pub const SCOPE: &str = "SCOPE";
pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const API_KEY: &str = "API_KEY";

/// Every key a tenant must provide, in the order they are reported when missing.
pub const REQUIRED_KEYS: [&str; 7] = [
    COMPANY,
    ENVIRONMENT,
    GRANT_TYPE,
    SCOPE,
    CLIENT_ID,
    CLIENT_SECRET,
    API_KEY,
];

/// A key-value configuration source credentials can be resolved from.
pub trait CredentialSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl CredentialSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl<S: CredentialSource + ?Sized> CredentialSource for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Layers two sources: a non-blank value from `primary` wins, otherwise
/// `fallback` is consulted.
#[derive(Debug, Clone)]
pub struct Fallback<A, B> {
    pub primary: A,
    pub fallback: B,
}

impl<A: CredentialSource, B: CredentialSource> CredentialSource for Fallback<A, B> {
    fn get(&self, key: &str) -> Option<String> {
        self.primary
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.fallback.get(key))
    }
}

/// Tenant fields carried in an `Authorization: Bearer
/// company:environment:clientId:clientSecret:apiKey` header.
///
/// Only the five tenant fields travel in the header; grant type and scope are
/// constant per integration and must come from another source.
#[derive(Clone)]
pub struct BearerCredentials {
    fields: HashMap<&'static str, String>,
}

impl BearerCredentials {
    const FIELDS: [&'static str; 5] = [COMPANY, ENVIRONMENT, CLIENT_ID, CLIENT_SECRET, API_KEY];

    /// Parses the value of an `Authorization` header.
    ///
    /// Returns `None` when the header is not a bearer credential at all.
    /// Segments that are absent or empty are simply not provided, so
    /// resolution reports them as missing.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, payload) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") || !payload.contains(':') {
            return None;
        }

        let fields = Self::FIELDS
            .iter()
            .zip(payload.trim().splitn(Self::FIELDS.len(), ':'))
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (*key, value.to_string()))
            .collect();

        Some(Self { fields })
    }
}

impl CredentialSource for BearerCredentials {
    fn get(&self, key: &str) -> Option<String> {
        self.fields.get(key).cloned()
    }
}

impl fmt::Debug for BearerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredentials")
            .field("company", &self.fields.get(COMPANY))
            .field("environment", &self.fields.get(ENVIRONMENT))
            .finish_non_exhaustive()
    }
}

/// Tenant api key, sent as `X-Keka-APIKey`.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: String) -> Self {
        Self(key)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([redacted])")
    }
}

/// Digest of the client identity a token was issued to.
///
/// Tokens are cached per [`TenantKey`], but a cached token is only handed to
/// callers presenting the same client credentials. The digest lets the cache
/// compare them without keeping the secrets around.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientFingerprint([u8; 32]);

impl fmt::Debug for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientFingerprint(..)")
    }
}

/// Identifies a tenant's token namespace: `company-environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(company: &str, environment: &str) -> Self {
        Self(format!("{company}-{environment}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// One tenant's OAuth identity. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct TenantCredentials {
    company: String,
    environment: String,
    grant_type: String,
    scope: String,
    client_id: ClientId,
    client_secret: ClientSecret,
    api_key: ApiKey,
}

impl TenantCredentials {
    /// Validates and extracts credentials from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] naming every required key that is
    /// absent or blank, in [`REQUIRED_KEYS`] order, and
    /// [`AuthError::InvalidTenant`] when `COMPANY` or `ENVIRONMENT` is not a
    /// single DNS label.
    pub fn resolve(source: &impl CredentialSource) -> Result<Self, AuthError> {
        let mut values = HashMap::with_capacity(REQUIRED_KEYS.len());
        let mut missing = Vec::new();

        for key in REQUIRED_KEYS {
            match source.get(key).filter(|v| !v.trim().is_empty()) {
                Some(value) => {
                    values.insert(key, value);
                }
                None => missing.push(key),
            }
        }

        if !missing.is_empty() {
            return Err(AuthError::Configuration { missing });
        }

        let mut take = |key: &str| values.remove(key).unwrap_or_default();
        let company = host_label(COMPANY, &take(COMPANY))?;
        let environment = host_label(ENVIRONMENT, &take(ENVIRONMENT))?;
        Ok(Self {
            company,
            environment,
            grant_type: take(GRANT_TYPE),
            scope: take(SCOPE),
            client_id: ClientId::new(take(CLIENT_ID)),
            client_secret: ClientSecret::new(take(CLIENT_SECRET)),
            api_key: ApiKey::new(take(API_KEY)),
        })
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn grant_type(&self) -> &str {
        &self.grant_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub const fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn tenant_key(&self) -> TenantKey {
        TenantKey::new(&self.company, &self.environment)
    }

    pub fn fingerprint(&self) -> ClientFingerprint {
        let mut hasher = Sha256::new();
        for field in [
            self.grant_type.as_str(),
            self.scope.as_str(),
            self.client_id.as_str(),
            self.client_secret.secret().as_str(),
            self.api_key.secret(),
        ] {
            // Length prefixes keep `ab`+`c` and `a`+`bc` apart.
            hasher.update(u64::try_from(field.len()).unwrap_or(u64::MAX).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        ClientFingerprint(hasher.finalize().into())
    }
}

const MAX_LABEL_LEN: usize = 63;

/// Company and environment become host labels of the tenant URLs, so each
/// must be one label: ASCII letters, digits and inner hyphens.
fn host_label(key: &'static str, value: &str) -> Result<String, AuthError> {
    let label = value.trim();
    let valid = label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(label.to_string())
    } else {
        Err(AuthError::InvalidTenant { key })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn demo_source() -> HashMap<String, String> {
        [
            (COMPANY, "googleindia"),
            (ENVIRONMENT, "kekademo"),
            (GRANT_TYPE, "kekaapi"),
            (SCOPE, "kekaapi"),
            (CLIENT_ID, "abc"),
            (CLIENT_SECRET, "xyz"),
            (API_KEY, "key1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    pub(crate) fn demo_credentials() -> TenantCredentials {
        TenantCredentials::resolve(&demo_source()).expect("demo credentials resolve")
    }

    /// Demo tenant with a different client identity.
    pub(crate) fn credentials_with(
        client_id: &str,
        client_secret: &str,
        api_key: &str,
    ) -> TenantCredentials {
        let mut source = demo_source();
        source.insert(CLIENT_ID.to_string(), client_id.to_string());
        source.insert(CLIENT_SECRET.to_string(), client_secret.to_string());
        source.insert(API_KEY.to_string(), api_key.to_string());
        TenantCredentials::resolve(&source).expect("credentials resolve")
    }

    #[test]
    fn resolves_complete_source() {
        let creds = demo_credentials();
        assert_eq!(creds.company(), "googleindia");
        assert_eq!(creds.environment(), "kekademo");
        assert_eq!(creds.grant_type(), "kekaapi");
        assert_eq!(creds.client_id().as_str(), "abc");
        assert_eq!(creds.client_secret().secret(), "xyz");
        assert_eq!(creds.api_key().secret(), "key1");
        assert_eq!(creds.tenant_key().as_str(), "googleindia-kekademo");
    }

    #[test]
    fn reports_exactly_the_missing_subset() {
        // Every subset of the required keys, encoded as a bitmask.
        for mask in 1u32..(1 << REQUIRED_KEYS.len()) {
            let mut source = demo_source();
            let expected: Vec<&str> = REQUIRED_KEYS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();
            for (i, key) in expected.iter().enumerate() {
                // Alternate between absent and blank values.
                if i % 2 == 0 {
                    source.remove(*key);
                } else {
                    source.insert((*key).to_string(), "   ".to_string());
                }
            }

            match TenantCredentials::resolve(&source) {
                Err(AuthError::Configuration { missing }) => assert_eq!(missing, expected),
                other => panic!("mask {mask:#b}: expected configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", demo_credentials());
        assert!(rendered.contains("googleindia"));
        assert!(!rendered.contains("xyz"));
        assert!(!rendered.contains("key1"));
    }

    #[test]
    fn parses_bearer_header() {
        let header = BearerCredentials::parse("Bearer acme:prod:cid:csecret:akey")
            .expect("bearer credentials");
        assert_eq!(header.get(COMPANY).as_deref(), Some("acme"));
        assert_eq!(header.get(ENVIRONMENT).as_deref(), Some("prod"));
        assert_eq!(header.get(CLIENT_ID).as_deref(), Some("cid"));
        assert_eq!(header.get(CLIENT_SECRET).as_deref(), Some("csecret"));
        assert_eq!(header.get(API_KEY).as_deref(), Some("akey"));
        assert_eq!(header.get(GRANT_TYPE), None);
        assert!(!format!("{header:?}").contains("csecret"));
    }

    #[test]
    fn ignores_non_bearer_headers() {
        assert!(BearerCredentials::parse("Basic dXNlcjpwYXNz").is_none());
        assert!(BearerCredentials::parse("Bearer opaque-token").is_none());
        assert!(BearerCredentials::parse("").is_none());
    }

    #[test]
    fn short_bearer_header_reports_missing_fields() {
        let header = BearerCredentials::parse("Bearer acme:prod::csecret").expect("bearer");
        let defaults: HashMap<String, String> = [(GRANT_TYPE, "kekaapi"), (SCOPE, "kekaapi")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let layered = Fallback {
            primary: header,
            fallback: defaults,
        };

        match TenantCredentials::resolve(&layered) {
            Err(AuthError::Configuration { missing }) => {
                assert_eq!(missing, vec![CLIENT_ID, API_KEY]);
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_company_that_is_not_a_host_label() {
        let header = BearerCredentials::parse("Bearer evil.example/x?:kekademo:c:s:k")
            .expect("bearer credentials");
        let layered = Fallback {
            primary: header,
            fallback: demo_source(),
        };

        match TenantCredentials::resolve(&layered) {
            Err(AuthError::InvalidTenant { key }) => assert_eq!(key, COMPANY),
            other => panic!("expected invalid tenant, got {other:?}"),
        }
    }

    #[test]
    fn host_labels_allow_letters_digits_and_inner_hyphens() {
        for good in ["googleindia", "acme-2", "KekaDemo", "a"] {
            assert!(host_label(COMPANY, good).is_ok(), "{good}");
        }
        for bad in [
            "evil.example",
            "a/b",
            "user@host",
            "x#y",
            "q?",
            "h:8080",
            "-lead",
            "trail-",
            "sp ace",
        ] {
            assert!(
                matches!(
                    host_label(ENVIRONMENT, bad),
                    Err(AuthError::InvalidTenant { key: ENVIRONMENT })
                ),
                "{bad}"
            );
        }
        assert!(host_label(COMPANY, &"a".repeat(MAX_LABEL_LEN + 1)).is_err());
        assert_eq!(host_label(COMPANY, "  acme ").expect("trimmed"), "acme");
    }

    #[test]
    fn fingerprint_tracks_client_identity_only() {
        let demo = demo_credentials();
        assert_eq!(demo.fingerprint(), credentials_with("abc", "xyz", "key1").fingerprint());
        assert_ne!(demo.fingerprint(), credentials_with("abc", "xyz", "other").fingerprint());
        assert_ne!(demo.fingerprint(), credentials_with("ab", "cxyz", "key1").fingerprint());
        assert!(!format!("{:?}", demo.fingerprint()).contains("xyz"));
    }

    #[test]
    fn fallback_prefers_primary_values() {
        let mut primary = HashMap::new();
        primary.insert(COMPANY.to_string(), "acme".to_string());
        primary.insert(ENVIRONMENT.to_string(), String::new());
        let layered = Fallback {
            primary,
            fallback: demo_source(),
        };

        let creds = TenantCredentials::resolve(&layered).expect("layered credentials");
        assert_eq!(creds.company(), "acme");
        assert_eq!(creds.environment(), "kekademo");
    }
}
