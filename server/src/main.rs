use std::net::SocketAddr;
use std::sync::Arc;

use querystream::config::ServerConfig;
use querystream::engine::MemoryEngine;
use querystream::server;
use querystream::service::QueryService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querystream=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: listen={}:{}, users={}, quota_classes={}, max_block_size={}",
        config.listen_address,
        config.listen_port,
        config.users.len(),
        config.quotas.len(),
        config.max_block_size
    );

    let engine = Arc::new(MemoryEngine::new(config.max_block_size));
    let service = Arc::new(QueryService::new(&config, engine));

    // Clients connect on ws://<address>:<port>/query
    let addr = SocketAddr::new(config.listen_address, config.listen_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        });
    tracing::info!("listening on {}", addr);

    server::serve(listener, service, config.connection_channel_capacity)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {e}");
            std::process::exit(1);
        });
}
