//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Dispatch requests to the proxy dispatcher
//! - Apply hot-reloaded service tables
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::metadata::{ServiceDefinitionService, StaticServiceDefinitions};
use crate::observability::metrics;
use crate::proxy::{error_response, ProxyDispatcher};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build outbound HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ProxyDispatcher>,
}

/// HTTP server for the service proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: Arc<ProxyDispatcher>,
    /// Present when services come from configuration and can be reloaded.
    services: Option<Arc<StaticServiceDefinitions>>,
}

impl HttpServer {
    /// Create a server whose service definitions come from `config.services`.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let services = Arc::new(StaticServiceDefinitions::new(&config.services));
        let mut server = Self::with_metadata(config, services.clone())?;
        server.services = Some(services);
        Ok(server)
    }

    /// Create a server backed by an external metadata source.
    pub fn with_metadata(
        config: ProxyConfig,
        metadata: Arc<dyn ServiceDefinitionService>,
    ) -> Result<Self, ServerError> {
        let dispatcher = Arc::new(ProxyDispatcher::from_config(&config, metadata)?);
        let state = AppState {
            dispatcher: dispatcher.clone(),
        };

        Ok(Self {
            router: Self::build_router(state),
            config,
            dispatcher,
            services: None,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs arriving on `config_updates` replace the service table and
    /// flush the proxy cache.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = self.config.services.len(),
            "HTTP server starting"
        );

        let sweep_secs = self.config.proxy.cache_sweep_interval_secs;
        if sweep_secs > 0 {
            let cache = self.dispatcher.cache().clone();
            tokio::spawn(cache.run_sweeper(Duration::from_secs(sweep_secs), shutdown.resubscribe()));
        }

        tokio::spawn(apply_config_updates(
            self.dispatcher.clone(),
            self.services.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<ProxyDispatcher> {
        &self.dispatcher
    }
}

async fn apply_config_updates(
    dispatcher: Arc<ProxyDispatcher>,
    services: Option<Arc<StaticServiceDefinitions>>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if let Some(services) = &services {
                    services.replace(&config.services);
                }
                dispatcher.cache().clear();
                tracing::info!(services = config.services.len(), "Configuration reloaded, proxy cache cleared");
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Catch-all proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();

    let span = tracing::info_span!("proxy", request_id = %request_id);
    async move {
        tracing::debug!(method = %method, path = %request.uri().path(), "Proxying request");

        let response = match state.dispatcher.dispatch(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
        response
    }
    .instrument(span)
    .await
}

/// Router answering every request with 500 when the proxy could not start.
pub fn invalid_state_router(message: impl Into<String>) -> Router {
    let message: Arc<str> = Arc::from(message.into());
    let handler = move || {
        let message = message.clone();
        async move { error_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid_state", &message) }
    };

    Router::new()
        .route("/{*path}", any(handler.clone()))
        .route("/", any(handler))
        .layer(TraceLayer::new_for_http())
}

/// Serve [`invalid_state_router`] until `shutdown` fires.
pub async fn serve_invalid_state(
    listener: TcpListener,
    message: String,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::error!(error = %message, "Proxy unavailable, serving invalid-state handler");

    axum::serve(listener, invalid_state_router(message))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
