//! HTTP Surface
//!
//! axum router exposing the store writers, the gallery façade, the image
//! proxy and the change signal, all nested under the configured prefix.

mod events;
mod routes;
mod state;

pub use state::AppState;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Invalid bind address '{addr}': {reason}")]
    InvalidBind { addr: String, reason: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Setup(#[from] ApiError),
}

/// Build the router for `state`, nested under `state.route_prefix`.
pub fn router(state: AppState) -> Router {
    let prefix = normalize_prefix(&state.route_prefix);
    let routes = Router::new()
        .route("/set_prompt", post(routes::set_prompt))
        .route("/set_preview", post(routes::set_preview))
        .route("/images", get(routes::list_images))
        .route("/image_by_url", get(routes::image_by_url))
        .route("/proxy_image", get(routes::proxy_image))
        .route("/signal", get(routes::signal))
        .route("/events", get(events::store_events))
        .with_state(state);

    let app = match prefix {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };
    app.layer(TraceLayer::new_for_http())
}

/// `None` for an empty or root prefix; otherwise a single leading slash and no trailing one.
fn normalize_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServiceConfig) -> Result<(), ServeError> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e: std::net::AddrParseError| ServeError::InvalidBind {
            addr: config.server.bind.clone(),
            reason: e.to_string(),
        })?;

    let state = AppState::from_config(config)?;
    let prefix = state.route_prefix.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(
        addr = %addr,
        prefix = %prefix,
        api_key_file = %config.credentials.api_key_file.display(),
        "Gallery bridge listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gallery bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
