use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (devices, attendance_punches)");
        conn.execute_batch(
            "
            CREATE TABLE devices (
                device_sn   TEXT PRIMARY KEY,
                -- assigned by the back office, never by ingestion
                store_id    TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE attendance_punches (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                device_sn       TEXT,
                enrollid        INTEGER NOT NULL,
                punch_time      TEXT NOT NULL,
                inout           INTEGER,
                mode            INTEGER,
                event           INTEGER,
                verifymode      INTEGER,
                temp            REAL,
                image_base64    TEXT,
                raw_json        TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_punches_device_time
                ON attendance_punches(device_sn, punch_time);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
