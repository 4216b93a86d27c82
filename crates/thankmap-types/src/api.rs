use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Gratitude;

// -- Share --

/// Response of `GET /share/{code}`. Coordinates are the stored ones, not
/// jittered. `variant` selects the marker icon on the client; the server
/// does not store one and always sends 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedGratitude {
    pub id: i64,
    pub message: String,
    pub lat: f64,
    pub lng: f64,
    pub short_code: String,
    pub created_at: DateTime<Utc>,
    pub variant: u8,
}

impl From<Gratitude> for SharedGratitude {
    fn from(g: Gratitude) -> Self {
        Self {
            id: g.id,
            message: g.message,
            lat: g.lat,
            lng: g.lng,
            short_code: g.short_code,
            created_at: g.created_at,
            variant: 0,
        }
    }
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Health --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}
