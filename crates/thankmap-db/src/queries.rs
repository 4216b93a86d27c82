use crate::models::GratitudeRow;
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use thankmap_types::models::ViewBox;

const COLUMNS: &str = "id, message, lat, lng, short_code, created_at";

impl Database {
    /// Store a new gratitude and return the row as persisted.
    pub fn insert_gratitude(
        &self,
        message: &str,
        lat: f64,
        lng: f64,
        short_code: &str,
    ) -> Result<GratitudeRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                &format!(
                    "INSERT INTO gratitudes (message, lat, lng, short_code) VALUES (?1, ?2, ?3, ?4)
                     RETURNING {COLUMNS}"
                ),
                rusqlite::params![message, lat, lng, short_code],
                map_row,
            )?;
            Ok(row)
        })
    }

    /// Most recent gratitudes, newest first.
    pub fn recent_gratitudes(&self, limit: u32) -> Result<Vec<GratitudeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM gratitudes ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Gratitudes inside a view box, newest first.
    pub fn gratitudes_in_view(&self, view: &ViewBox, limit: u32) -> Result<Vec<GratitudeRow>> {
        self.with_conn(|conn| query_in_view(conn, view, limit))
    }

    pub fn gratitude_by_code(&self, short_code: &str) -> Result<Option<GratitudeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM gratitudes WHERE short_code = ?1"
            ))?;
            let row = stmt.query_row([short_code], map_row).optional()?;
            Ok(row)
        })
    }
}

fn query_in_view(conn: &Connection, view: &ViewBox, limit: u32) -> Result<Vec<GratitudeRow>> {
    // A box crossing the antimeridian is the union of [west, 180] and [-180, east].
    let lng_clause = if view.crosses_antimeridian() {
        "(lng >= ?3 OR lng <= ?4)"
    } else {
        "lng BETWEEN ?3 AND ?4"
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM gratitudes
         WHERE lat BETWEEN ?1 AND ?2 AND {lng_clause}
         ORDER BY id DESC
         LIMIT ?5"
    ))?;

    let rows = stmt
        .query_map(
            rusqlite::params![view.south, view.north, view.west, view.east, limit],
            map_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<GratitudeRow> {
    Ok(GratitudeRow {
        id: row.get(0)?,
        message: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        short_code: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thankmap_types::models::MapBounds;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_gratitude("paris", 48.85, 2.35, "paris00001").unwrap();
        db.insert_gratitude("tokyo", 35.68, 139.69, "tokyo00001").unwrap();
        db.insert_gratitude("fiji", -17.7, 178.0, "fiji000001").unwrap();
        db.insert_gratitude("samoa", -13.8, -171.8, "samoa00001").unwrap();
        db
    }

    fn messages(rows: &[GratitudeRow]) -> Vec<&str> {
        rows.iter().map(|r| r.message.as_str()).collect()
    }

    #[test]
    fn insert_returns_stored_row() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_gratitude("hello", 10.0, 20.0, "abcdefghij").unwrap();
        assert!(row.id > 0);
        assert_eq!(row.message, "hello");
        assert_eq!((row.lat, row.lng), (10.0, 20.0));
        assert_eq!(row.short_code, "abcdefghij");

        let g = row.into_gratitude();
        assert_ne!(g.created_at, chrono::DateTime::<chrono::Utc>::default());
    }

    #[test]
    fn duplicate_short_code_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.insert_gratitude("one", 0.0, 0.0, "samecode00").unwrap();
        assert!(db.insert_gratitude("two", 1.0, 1.0, "samecode00").is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_refused() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_gratitude("bad", 91.0, 0.0, "badcode001").is_err());
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let db = seeded();
        let rows = db.recent_gratitudes(3).unwrap();
        assert_eq!(messages(&rows), vec!["samoa", "fiji", "tokyo"]);
    }

    #[test]
    fn view_filters_by_box() {
        let db = seeded();
        let europe = MapBounds { north: 60.0, south: 35.0, east: 30.0, west: -10.0 }
            .to_view()
            .unwrap();
        let rows = db.gratitudes_in_view(&europe, 100).unwrap();
        assert_eq!(messages(&rows), vec!["paris"]);
    }

    #[test]
    fn view_across_antimeridian() {
        let db = seeded();
        let pacific = MapBounds { north: 0.0, south: -30.0, east: 195.0, west: 170.0 }
            .to_view()
            .unwrap();
        let rows = db.gratitudes_in_view(&pacific, 100).unwrap();
        assert_eq!(messages(&rows), vec!["samoa", "fiji"]);
    }

    #[test]
    fn view_respects_limit() {
        let db = seeded();
        let world = MapBounds { north: 90.0, south: -90.0, east: 180.0, west: -180.0 }
            .to_view()
            .unwrap();
        assert_eq!(db.gratitudes_in_view(&world, 2).unwrap().len(), 2);
    }

    #[test]
    fn lookup_by_code() {
        let db = seeded();
        let row = db.gratitude_by_code("tokyo00001").unwrap().unwrap();
        assert_eq!(row.message, "tokyo");
        assert!(db.gratitude_by_code("missing000").unwrap().is_none());
    }
}
