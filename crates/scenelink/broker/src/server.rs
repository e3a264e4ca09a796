//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::relay::Relay;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Scenelink broker server
pub struct Server {
    config: BrokerConfig,
    relay: Arc<Relay>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: BrokerConfig) -> Self {
        let relay = Arc::new(Relay::new(config.relay.clone()));
        Self { config, relay }
    }

    /// Shared relay hub
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    pub fn router(&self) -> Router {
        create_router(AppState::new(self.relay(), self.config.server.clone()))
    }

    /// Bind the configured address and run until Ctrl+C or SIGTERM
    pub async fn run(self) -> BrokerResult<()> {
        let addr = self.config.server.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> BrokerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        tracing::info!("Scenelink broker listening on {}", listener.local_addr()?);
        tracing::info!(
            "Collect deadline: {}ms",
            self.config.relay.collect_timeout_ms
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| BrokerError::Server(e.to_string()))?;

        tracing::info!("Scenelink broker shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
