//! Connectivity and maintenance tools.
//!
//! Nothing here talks to Keka. `ping` reports which configuration keys are
//! present (never their values) and `clear_token_cache` drops every cached
//! bearer token so the next call per tenant performs a fresh exchange.

use rmcp::model::{CallToolResult, Content};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::KekaGateway;
use crate::mcp::auth::{CredentialSource, credentials::REQUIRED_KEYS};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional message to include in the response")]
    pub message: Option<String>,
}

/// Maps every required credential key to `Set` or `Not set`.
pub fn configuration_status(source: &impl CredentialSource) -> Value {
    let status: Map<String, Value> = REQUIRED_KEYS
        .iter()
        .map(|key| {
            let set = source.get(key).is_some_and(|v| !v.trim().is_empty());
            ((*key).to_string(), Value::from(if set { "Set" } else { "Not set" }))
        })
        .collect();
    Value::Object(status)
}

pub fn ping(
    gateway: &KekaGateway,
    source: &impl CredentialSource,
    PingRequest { message }: PingRequest,
) -> CallToolResult {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Server is operational".to_string());

    CallToolResult::structured(json!({
        "reply": format!("Pong! {message}"),
        "cached_tenants": gateway.provider().cached_tenants(),
        "configuration": configuration_status(source),
    }))
}

pub fn clear_token_cache(gateway: &KekaGateway) -> CallToolResult {
    let cleared = gateway.provider().clear_token_cache();
    CallToolResult::success(vec![Content::text(format!(
        "Token cache cleared ({cleared} tenant token(s) dropped)."
    ))])
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, time::Duration};

    use wiremock::MockServer;

    use super::*;
    use crate::mcp::{
        auth::{
            credentials::tests::{demo_credentials, demo_source},
            tests::{mount_token, provider_for},
        },
        http::build_http_client,
    };

    fn gateway_for(server: &MockServer) -> KekaGateway {
        let client = build_http_client(Duration::from_secs(5)).expect("http client");
        KekaGateway::new(client, Arc::new(provider_for(server)))
    }

    #[test]
    fn status_never_reveals_values() {
        let mut source = demo_source();
        source.remove("API_KEY");
        let status = configuration_status(&source);

        assert_eq!(status["CLIENT_SECRET"], "Set");
        assert_eq!(status["API_KEY"], "Not set");
        let rendered = status.to_string();
        assert!(!rendered.contains("xyz"));
        assert!(!rendered.contains("googleindia"));
    }

    #[tokio::test]
    async fn ping_echoes_message() {
        let server = MockServer::start().await;
        let result = ping(
            &gateway_for(&server),
            &HashMap::<String, String>::new(),
            PingRequest {
                message: Some("hello".to_string()),
            },
        );
        let content = result.structured_content.expect("structured content");
        assert_eq!(content["reply"], "Pong! hello");
        assert_eq!(content["cached_tenants"], 0);
        assert_eq!(content["configuration"]["COMPANY"], "Not set");
    }

    #[tokio::test]
    async fn clear_drops_cached_tokens() {
        let server = MockServer::start().await;
        mount_token(&server, "tok_123", 1).await;
        let gateway = gateway_for(&server);
        gateway
            .provider()
            .get_auth_token(&demo_credentials())
            .await
            .expect("token");

        let result = clear_token_cache(&gateway);
        assert_ne!(result.is_error, Some(true));
        assert_eq!(gateway.provider().cached_tenants(), 0);
    }
}
