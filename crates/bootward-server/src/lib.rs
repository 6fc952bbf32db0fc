//! Bootward network-boot service
//!
//! Answers iPXE and Ignition requests from bare-metal machines. Each request
//! is resolved from the caller's address to a MAC, checked against the
//! machine record it asks for, and served either the default provisioning
//! assets or the machine's own assets.

pub mod api;
pub mod assets;
pub mod binding;
pub mod client_ip;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod metrics;
pub mod render;
pub mod selector;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

use axum::extract::MatchedPath;
use axum::Router;
use bootward_ignition::{ButaneTranslator, TranslateOptions, Translator};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

pub use config::Config;
pub use directory::{Directory, DirectoryGateway, KubeDirectory, MemoryDirectory, Namespaces};
pub use service::BootService;

use assets::DefaultAssetSet;
use events::{AuditTrail, EventError, HttpEventSink};
use crate::metrics::RequestMetrics;
use selector::AssetSelector;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to set up audit events: {0}")]
    Events(#[from] EventError),
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: BootService,
    pub metrics: Arc<dyn RequestMetrics>,
}

impl AppState {
    /// Wire the service from configuration and a directory backend
    pub fn new(
        config: Config,
        directory: Arc<dyn Directory>,
        metrics: Arc<dyn RequestMetrics>,
    ) -> Result<Self, ServeError> {
        let audit = if config.event_handler_url.is_empty() {
            AuditTrail::disabled()
        } else {
            AuditTrail::new(Arc::new(HttpEventSink::new(
                config.event_handler_url.clone(),
                config.token_path.clone(),
            )?))
        };
        let translator: Arc<dyn Translator> =
            Arc::new(ButaneTranslator::new(TranslateOptions::default()));

        Ok(Self::with_parts(config, directory, translator, audit, metrics))
    }

    pub fn with_parts(
        config: Config,
        directory: Arc<dyn Directory>,
        translator: Arc<dyn Translator>,
        audit: AuditTrail,
        metrics: Arc<dyn RequestMetrics>,
    ) -> Self {
        let gateway = DirectoryGateway::new(
            directory,
            Namespaces {
                assets: config.configmap_namespace.clone(),
                ipam: config.ipam_namespace.clone(),
                inventory: config.inventory_namespace.clone(),
            },
        );
        let defaults = DefaultAssetSet::new(
            config.default_secret_path.clone(),
            config.default_configmap_path.clone(),
        );
        let selector = AssetSelector::new(gateway.clone(), defaults);
        let service = BootService::new(gateway, selector, translator, audit, metrics.clone());

        Self {
            config: Arc::new(config),
            service,
            metrics,
        }
    }
}

/// Router with tracing applied
pub fn router(state: AppState) -> Router {
    api::api_router()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());

                    tracing::debug_span!(
                        "http-request",
                        method = %request.method(),
                        uri = %request.uri(),
                        matched_path = matched_path,
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM
pub async fn run(
    config: Config,
    directory: Arc<dyn Directory>,
    metrics: Arc<dyn RequestMetrics>,
) -> Result<(), ServeError> {
    let addr = config.listen_address;
    let state = AppState::new(config, directory, metrics)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
