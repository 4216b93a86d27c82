use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gratitudes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message     TEXT NOT NULL,
            lat         REAL NOT NULL CHECK (lat BETWEEN -90 AND 90),
            lng         REAL NOT NULL CHECK (lng BETWEEN -180 AND 180),
            short_code  TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_gratitudes_position
            ON gratitudes(lat, lng);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
