use serde::{Deserialize, Serialize};

use crate::models::{Gratitude, MapBounds};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Recent history, sent once right after the connection opens
    InitialData(Vec<Gratitude>),

    /// Gratitudes inside the viewport the client last reported
    UpdateMapDots(Vec<Gratitude>),

    /// A new gratitude was posted (position is jittered)
    NewBlink(Blink),

    /// The submitter's gratitude was stored
    UploadSuccess { link: String },

    /// Human readable warning, currently only sent when rate limited
    ErrorMsg(String),
}

/// Live broadcast of a freshly stored gratitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blink {
    pub id: i64,
    pub message: String,
    pub lat: f64,
    pub lng: f64,
    /// Client-side placeholder id echoed back so the submitter can swap its
    /// optimistic marker for the real one.
    #[serde(rename = "tempId", default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub short_code: String,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Drop a gratitude on the map
    SubmitGratitude(Submission),

    /// Report the visible map area
    MapBounds(MapBounds),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub message: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "tempId", default)]
    pub temp_id: Option<String>,
}

impl GatewayEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialData(_) => "initial_data",
            Self::UpdateMapDots(_) => "update_map_dots",
            Self::NewBlink(_) => "new_blink",
            Self::UploadSuccess { .. } => "upload_success",
            Self::ErrorMsg(_) => "error_msg",
        }
    }
}
