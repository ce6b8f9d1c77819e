use std::{env, sync::LazyLock};

use anyhow::Result;
use axum::{Json, Router, routing::get, serve};
use dotenv::dotenv;
use keka_mcp::mcp::{KekaMCPFactory, auth::EnvSource, tools::admin::configuration_status};
use rmcp::transport::{
    StreamableHttpServerConfig, StreamableHttpService,
    streamable_http_server::session::local::LocalSessionManager,
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static BIND_ADDRESS: LazyLock<String> =
    LazyLock::new(|| env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()));

// Root endpoint for status checks. Only reports whether settings are present.
async fn status() -> Json<Value> {
    Json(json!({
        "status": "running",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/mcp"],
        "env_check": configuration_status(&EnvSource),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load variables from .env file if it exists into the environment
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // One factory for the whole process so every session shares the token cache
    let factory = KekaMCPFactory::new()?;

    // Setting up the Streamable HTTP Service
    info!("Setting up the Streamable HTTP Service for the Keka MCP Factory");
    let service = StreamableHttpService::new(
        move || Ok(factory.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    // Starting the server... Setting up the router and TCP listener
    let bind_address = BIND_ADDRESS.as_str();
    info!("Starting server on {}", bind_address);
    let router = Router::new()
        .route("/", get(status))
        .nest_service("/mcp", service);
    let tcp_listener = TcpListener::bind(bind_address).await?;

    // Graceful shutdown on CTRL+C
    let shutdown = async {
        signal::ctrl_c().await.unwrap_or_else(|e| {
            eprintln!("failed to install CTRL+C handler: {e}");
        });
    };

    // Finally start the server with graceful shutdown
    serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
