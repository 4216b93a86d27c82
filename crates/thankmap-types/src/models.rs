use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geotagged message as stored and served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gratitude {
    pub id: i64,
    pub message: String,
    pub lat: f64,
    pub lng: f64,
    pub short_code: String,
    pub created_at: DateTime<Utc>,
}

/// Raw map viewport as reported by the client. Longitudes may run past
/// +/-180 when the map is panned across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Normalized bounding box. Latitudes are clamped, longitudes wrapped into
/// [-180, 180]. `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl MapBounds {
    /// Normalize into a [`ViewBox`]. Returns `None` for viewports that cannot
    /// describe a region (non-finite edges, south above north).
    pub fn to_view(&self) -> Option<ViewBox> {
        let edges = [self.north, self.south, self.east, self.west];
        if edges.iter().any(|v| !v.is_finite()) || self.south > self.north {
            return None;
        }

        let south = self.south.clamp(-90.0, 90.0);
        let north = self.north.clamp(-90.0, 90.0);

        if self.east - self.west >= 360.0 {
            return Some(ViewBox { south, north, west: -180.0, east: 180.0 });
        }

        Some(ViewBox {
            south,
            north,
            west: wrap_lng(self.west),
            east: wrap_lng(self.east),
        })
    }
}

impl ViewBox {
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }
}

fn wrap_lng(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Returns true when the point is a valid WGS84 coordinate.
pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
