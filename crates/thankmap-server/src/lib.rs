pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use thankmap_api::{AppState, AppStateInner, health, share};
use thankmap_gateway::Gateway;
use thankmap_gateway::client_ip::client_ip;
use thankmap_gateway::connection;

#[derive(Clone)]
struct ServerState {
    gateway: Gateway,
    trust_proxy: bool,
}

/// Full HTTP surface: the WebSocket gateway plus the REST routes. Must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(gateway: Gateway, trust_proxy: bool) -> Router {
    let app_state: AppState = Arc::new(AppStateInner {
        db: gateway.db.clone(),
        dispatcher: gateway.dispatcher.clone(),
    });

    let rest_routes = Router::new()
        .route("/share/{code}", get(share::get_shared))
        .route("/health", get(health::health))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState { gateway, trust_proxy });

    Router::new()
        .merge(rest_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let ip = client_ip(peer, &headers, state.trust_proxy);
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.gateway, ip))
}
