//! sitesync-hub library - real-time site inventory hub
//!
//! Groups live WebSocket connections into per-site rooms, authorizes material
//! mutations, commits them through the persistence gateway and fans the confirmed
//! events out to the right room.

use axum::Router;
use std::sync::Arc;

pub mod api;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod realtime;

pub use crate::error::{ApiError, ApiResult};

use gateway::PersistenceGateway;
use identity::SessionVerifier;
use realtime::{RoomBroadcaster, RoomRegistry};

/// Application state shared across HTTP and WebSocket handlers
///
/// One instance per process, built at startup; the registry and broadcaster live for
/// the whole process and need no teardown.
#[derive(Clone)]
pub struct AppState {
    /// Durable store access
    pub gateway: PersistenceGateway,
    /// Room membership of live connections
    pub registry: Arc<RoomRegistry>,
    /// Authorize → commit → fan-out
    pub broadcaster: RoomBroadcaster,
    /// Session token verification
    pub sessions: Arc<SessionVerifier>,
    /// Per-connection outbound queue size
    pub outbound_capacity: usize,
}

impl AppState {
    pub fn new(gateway: PersistenceGateway, shared_secret: i64, outbound_capacity: usize) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let broadcaster = RoomBroadcaster::new(registry.clone(), gateway.clone());
        Self {
            gateway,
            registry,
            broadcaster,
            sessions: Arc::new(SessionVerifier::new(shared_secret)),
            outbound_capacity,
        }
    }
}

/// Build application router
///
/// `/health` and `/ws` are public (the socket resolves its own identity at
/// handshake); everything under `/api` requires a session.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let protected = Router::new()
        .route("/api/sites", get(api::list_sites))
        .route("/api/create_site", post(api::create_site))
        .route("/api/get_materials/:site_id", get(api::get_materials))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    let public = Router::new()
        .route("/ws", get(realtime::ws_handler))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
