//! Inkroom collaboration server.
//!
//! Relays element mutations between the clients joined to a room and keeps
//! the durable element log for each room.

pub mod auth;
pub mod config;
pub mod registry;
pub mod relay;
pub mod sequencer;
pub mod store;
pub mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use auth::SessionProvider;
use registry::ConnectionRegistry;
use sequencer::RoomSequencer;
use store::DurableStore;

/// Shared server state.
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub sequencer: RoomSequencer,
    pub store: Arc<dyn DurableStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub hydrate_limit: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn DurableStore>, sessions: Arc<dyn SessionProvider>, hydrate_limit: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sequencer: RoomSequencer::new(),
            store,
            sessions,
            hydrate_limit,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "Inkroom relay server - connect via WebSocket at /ws?token=<credential>"
}

async fn health() -> &'static str {
    "ok"
}
