//! HTTP server streaming broker messages to clients as Server-Sent Events.
//!
//! Every client that opens `/events/` is registered with the
//! [`Broker`](tc_broker::Broker) for the lifetime of its connection and
//! receives each published message as one `data:` frame.
//!
//! # Routes
//!
//! | Route              | Response                                        |
//! |--------------------|-------------------------------------------------|
//! | `GET /events/`     | `text/event-stream`, one frame per message      |
//! | `GET /events`      | same as `/events/`                              |
//! | `GET /`            | demo page that prints every received event      |
//! | `GET /stats`       | broker counters as JSON                         |
//! | `GET /healthz`     | `ok`                                            |
//!
//! # Shutdown
//!
//! [`serve`] runs until the [`AppState`] shutdown token is cancelled.
//! Cancelling it also ends every open event stream, so graceful shutdown
//! does not wait on long-lived connections.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod error;
mod state;
mod stream;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::get;
use tc_broker::StatsSnapshot;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ServerError, StreamError};
pub use state::AppState;
pub use stream::{EVENT_STREAM_CONTENT_TYPE, frame, stream_events};

const INDEX_HTML: &str = include_str!("assets/index.html");

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/events/", get(stream_events))
        .route("/events", get(stream_events))
        .route("/stats", get(stats))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves until the shutdown token is cancelled.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound and
/// [`ServerError::Io`] if serving fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve_listener(listener, state).await
}

/// Serves on an already bound listener until the shutdown token is
/// cancelled.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if serving fails.
pub async fn serve_listener(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    let local = listener.local_addr()?;
    let shutdown = state.shutdown_token().clone();

    info!(addr = %local, "Listening for event stream clients");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!(addr = %local, "HTTP server stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.broker().stats())
}

async fn healthz() -> &'static str {
    "ok"
}
