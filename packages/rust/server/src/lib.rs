//! HTTP API for FAQBot.
//!
//! Routes for the chat widget, the import pipeline, FAQ management and
//! billing, all sharing one [`AppContext`].

pub mod billing;
pub mod chat;
pub mod error;
pub mod faqs;
pub mod import;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use faqbot_core::AppContext;
use faqbot_shared::{FaqBotError, Result};

pub use error::ApiError;

const WIDGET_JS: &str = include_str!("../assets/widget.js");

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(chat::status))
        .route("/api/chat", get(chat::status).post(chat::chat))
        .route("/api/ask", post(chat::ask))
        .route(
            "/api/import-site",
            post(import::import_site).layer(DefaultBodyLimit::max(import::MAX_IMPORT_BODY)),
        )
        .route(
            "/api/faqs",
            get(faqs::list).post(faqs::create).delete(faqs::remove),
        )
        .route(
            "/api/checkout",
            get(billing::checkout_status).post(billing::checkout),
        )
        .route("/api/stripe-webhook", post(billing::stripe_webhook))
        .route("/widget.js", get(widget))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn widget() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/javascript; charset=utf-8")],
        WIDGET_JS,
    )
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

/// Bind `listen_addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(ctx: Arc<AppContext>, listen_addr: &str) -> Result<()> {
    let addr = parse_listen_addr(listen_addr)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| FaqBotError::Network(format!("failed to bind to {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| FaqBotError::Network(format!("failed to determine local address: {e}")))?;
    info!(%local_addr, "faqbot server listening");

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| FaqBotError::Network(format!("server error: {e}")))?;

    info!("server shutdown complete");
    Ok(())
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(FaqBotError::config("listen address may not be empty"));
    }
    trimmed
        .parse()
        .map_err(|e| FaqBotError::config(format!("invalid listen address `{trimmed}`: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = sigterm => info!("received SIGTERM, shutting down"),
    }
}
