use axum::{Json, extract::State};

use thankmap_types::api::HealthResponse;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        connections: state.dispatcher.connection_count().await,
    })
}
