//! Process entry point: load configuration, set up logging, build the
//! coordinator and its external collaborators, and serve the WebSocket
//! endpoint.

mod protocol;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tracing::info;

use trade_auth::{AuthVerifier, HttpSettlementClient, SettlementSigner, TokenVerifierImpl};
use trade_infra::config::AppConfig;
use trade_infra::logging::setup::{setup_logging, LoggingConfig};
use trade_session_core::{SessionCoordinator, SettlementClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    setup_logging(LoggingConfig::new(tracing::Level::INFO, "trade-gateway"))
        .unwrap_or_else(|e| eprintln!("logging already initialized: {e}"));

    info!(port = config.port, node_env = %config.node_env, "starting trade-gateway");

    let verifier: Arc<dyn trade_session_core::TokenVerifier> = match &config.backend_public_key {
        Some(pem) => Arc::new(TokenVerifierImpl::jwt(AuthVerifier::from_pem(pem)?)),
        None => Arc::new(TokenVerifierImpl::dev_passthrough()),
    };

    let settlement: Arc<dyn SettlementClient> = match (&config.private_key, &config.perform_trade_endpoint) {
        (Some(key_pem), Some(endpoint)) => {
            let signer = SettlementSigner::from_pem(key_pem)?;
            Arc::new(HttpSettlementClient::new(endpoint.clone(), signer))
        }
        _ => Arc::new(NoopSettlementClient),
    };

    let coordinator = SessionCoordinator::new(verifier, settlement);

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .with_state(coordinator);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Used when settlement isn't configured (development, or a deployment that
/// only runs the coordination layer without a live settlement backend).
struct NoopSettlementClient;

#[async_trait::async_trait]
impl SettlementClient for NoopSettlementClient {
    async fn submit(&self, trade: &trade_session_core::CompletedTrade) {
        tracing::warn!(
            users = ?trade.iter().map(|s| s.user_id.clone()).collect::<Vec<_>>(),
            "settlement not configured, dropping completed trade"
        );
    }
}
