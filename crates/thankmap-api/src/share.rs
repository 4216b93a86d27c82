use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;

use thankmap_types::api::SharedGratitude;
use thankmap_types::is_share_code;

use crate::AppState;
use crate::error::ApiError;

/// `GET /share/{code}`: look up one gratitude by its share code. Coordinates
/// are returned exactly as stored.
pub async fn get_shared(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SharedGratitude>, ApiError> {
    if !is_share_code(&code) {
        debug!("Rejecting malformed share code {:?}", code);
        return Err(ApiError::NotFound);
    }

    // Run blocking DB query off the async runtime
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.gratitude_by_code(&code))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(row.into_gratitude().into()))
}
