//! # HTTP Server
//!
//! Combines the gating and observability routers and runs them until
//! Ctrl-C, purging expired nonces and credentials in the background.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::config::HttpServerConfig;
use super::gating_routes::{gating_routes, GateService, GatingState};
use super::observability_routes::observability_routes;
use crate::observability::{log_event, Event};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP server for the gating API
pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<GatingState>,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, service: GateService) -> Self {
        let state = Arc::new(GatingState::new(service, config.admin_token.clone()));
        let router = Self::build_router(&config, state.clone());
        Self {
            config,
            state,
            router,
        }
    }

    fn build_router(config: &HttpServerConfig, state: Arc<GatingState>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let metrics = state.service.metrics().clone();
        Router::new()
            .merge(observability_routes(metrics))
            .nest("/gating", gating_routes(state))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address '{}': {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(event = Event::Serving.as_str(), %addr, "gatepost listening");

        let purger = tokio::spawn(purge_loop(self.state.clone()));
        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        purger.abort();

        log_event(Event::ShutdownComplete);
        result
    }
}

async fn purge_loop(state: Arc<GatingState>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match state.service.purge_expired() {
            Ok((nonces, credentials)) => debug!(nonces, credentials, "purged expired entries"),
            Err(e) => warn!(error = %e, "purge failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
