use chrono::{DateTime, NaiveDateTime, Utc};
use thankmap_types::models::Gratitude;
use tracing::warn;

/// Database row type. Maps directly to a `gratitudes` row; timestamps stay
/// as SQLite text until converted.
#[derive(Debug, Clone)]
pub struct GratitudeRow {
    pub id: i64,
    pub message: String,
    pub lat: f64,
    pub lng: f64,
    pub short_code: String,
    pub created_at: String,
}

impl GratitudeRow {
    pub fn into_gratitude(self) -> Gratitude {
        let created_at = parse_timestamp(&self.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on gratitude {}", self.created_at, self.id);
            DateTime::default()
        });

        Gratitude {
            id: self.id,
            message: self.message,
            lat: self.lat,
            lng: self.lng,
            short_code: self.short_code,
            created_at,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            // Rows written by hand with datetime('now') have no zone suffix.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}
