//! Server assembly: shared state, router, and the listen loop.

use crate::registry::ConnectionRegistry;
use crate::{webchat, ws};
use axum::routing::get;
use axum::Router;
use chatrelay_runtime::drivers::openai::OpenAiDriver;
use chatrelay_runtime::llm_driver::LlmDriver;
use chatrelay_types::config::{ApiKey, RelayConfig};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Error type for running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The accept loop failed.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Open client connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Upstream language-model driver.
    pub driver: Arc<dyn LlmDriver>,
    /// Model identifier sent with every request.
    pub model: Arc<str>,
}

impl AppState {
    pub fn new(driver: Arc<dyn LlmDriver>, model: impl Into<Arc<str>>) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            driver,
            model: model.into(),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route_service("/", webchat::index_page(static_dir))
        .fallback_service(webchat::static_files(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run_server(config: &RelayConfig, api_key: ApiKey) -> Result<(), ServerError> {
    let driver: Arc<dyn LlmDriver> = Arc::new(OpenAiDriver::new(
        api_key,
        config.upstream.api_url.clone(),
    ));
    let state = AppState::new(driver, config.upstream.model.as_str());

    if !webchat::has_index(&config.static_dir) {
        warn!(
            static_dir = %config.static_dir.display(),
            "No index.html in static directory, chat page will 404"
        );
    }

    let router = build_router(state.clone(), &config.static_dir);
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(
        addr = %addr,
        upstream = %config.upstream.api_url,
        model = %config.upstream.model,
        "Server starting"
    );

    serve(listener, router, shutdown_signal()).await?;

    info!(active = state.registry.len(), "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
