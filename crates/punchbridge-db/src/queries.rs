use crate::Database;
use crate::models::{DeviceRow, PunchRow};
use anyhow::Result;
use punchbridge_types::CanonicalPunch;
use rusqlite::Connection;

impl Database {
    // -- Devices --

    /// Register a terminal. An existing row is left exactly as it is so the
    /// back office keeps its store assignment.
    pub fn upsert_device(&self, device_sn: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO devices (device_sn) VALUES (?1) ON CONFLICT(device_sn) DO NOTHING",
                [device_sn],
            )?;
            Ok(())
        })
    }

    pub fn get_device(&self, device_sn: &str) -> Result<Option<DeviceRow>> {
        self.with_conn(|conn| query_device(conn, device_sn))
    }

    // -- Punches --

    /// Insert a batch of punches in one transaction. Either every row lands
    /// or none does.
    pub fn insert_punches(&self, punches: &[CanonicalPunch]) -> Result<usize> {
        if punches.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO attendance_punches
                        (device_sn, enrollid, punch_time, inout, mode, event, verifymode, temp, image_base64, raw_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;

                for punch in punches {
                    let raw_json = serde_json::to_string(&punch.raw_payload)?;
                    stmt.execute(rusqlite::params![
                        punch.device_serial,
                        punch.enroll_id,
                        punch.punch_time_iso(),
                        punch.inout,
                        punch.mode,
                        punch.event,
                        punch.verifymode,
                        punch.temp,
                        punch.image_payload,
                        raw_json,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(punches.len())
        })
    }

    /// Most recent punches first, by store identity.
    pub fn recent_punches(&self, limit: u32) -> Result<Vec<PunchRow>> {
        self.with_conn(|conn| query_recent_punches(conn, limit))
    }

    pub fn count_punches(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM attendance_punches", [], |r| r.get(0))?;
            Ok(count)
        })
    }
}

fn query_device(conn: &Connection, device_sn: &str) -> Result<Option<DeviceRow>> {
    let mut stmt =
        conn.prepare("SELECT device_sn, store_id, created_at FROM devices WHERE device_sn = ?1")?;

    let row = stmt
        .query_row([device_sn], |row| {
            Ok(DeviceRow {
                device_sn: row.get(0)?,
                store_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_recent_punches(conn: &Connection, limit: u32) -> Result<Vec<PunchRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, device_sn, enrollid, punch_time, inout, mode, event, verifymode, temp, image_base64, raw_json
         FROM attendance_punches
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(PunchRow {
                id: row.get(0)?,
                device_sn: row.get(1)?,
                enrollid: row.get(2)?,
                punch_time: row.get(3)?,
                inout: row.get(4)?,
                mode: row.get(5)?,
                event: row.get(6)?,
                verifymode: row.get(7)?,
                temp: row.get(8)?,
                image_base64: row.get(9)?,
                raw_json: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
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
