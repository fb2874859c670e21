//! # Stillroom Server
//!
//! REST backend for sessions, settings and stats. Every route is a thin
//! wrapper over a [`SessionStore`]; the store chosen at startup is the single
//! authoritative copy of the data.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use stillroom_core::SessionStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

/// Build the `/api` router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/sessions/:id",
            get(handlers::get_session)
                .patch(handlers::update_session)
                .delete(handlers::delete_session),
        )
        .route(
            "/api/settings",
            get(handlers::get_settings)
                .post(handlers::create_settings)
                .patch(handlers::update_settings),
        )
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "stillroom server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
