//! Booking log: one row per event created through the voice agent.

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

/// Details of a confirmed booking, before it is logged.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBooking {
    pub caller_name: String,
    pub meeting_title: String,
    /// `YYYY-MM-DD` in the meeting's timezone
    pub scheduled_date: String,
    /// `hh:mm AM`
    pub scheduled_time: String,
    pub duration_minutes: u32,
    pub timezone: String,
    pub google_event_id: Option<String>,
    pub google_event_link: Option<String>,
    /// Tenant whose calendar holds the event; `None` for the default calendar
    pub tenant_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub caller_name: String,
    pub meeting_title: Option<String>,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub duration_minutes: u32,
    pub timezone: String,
    pub google_event_id: Option<String>,
    pub google_event_link: Option<String>,
    pub tenant_email: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub struct BookingLog {
    conn: Mutex<Connection>,
}

impl BookingLog {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open bookings database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                caller_name TEXT NOT NULL,
                meeting_title TEXT,
                scheduled_date TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL DEFAULT 30,
                timezone TEXT NOT NULL,
                google_event_id TEXT,
                google_event_link TEXT,
                tenant_email TEXT,
                status TEXT NOT NULL DEFAULT 'confirmed',
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create bookings table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record a confirmed booking. Returns the row id.
    pub fn log_booking(&self, booking: &NewBooking) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO bookings (
                caller_name, meeting_title, scheduled_date, scheduled_time,
                duration_minutes, timezone, google_event_id, google_event_link,
                tenant_email, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                booking.caller_name,
                booking.meeting_title,
                booking.scheduled_date,
                booking.scheduled_time,
                booking.duration_minutes,
                booking.timezone,
                booking.google_event_id,
                booking.google_event_link,
                booking.tenant_email,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert booking")?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent bookings first.
    pub fn recent(&self, limit: u32) -> Result<Vec<Booking>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, caller_name, meeting_title, scheduled_date, scheduled_time,
                        duration_minutes, timezone, google_event_id, google_event_link,
                        tenant_email, status, created_at
                 FROM bookings ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare bookings query")?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(Booking {
                    id: row.get(0)?,
                    caller_name: row.get(1)?,
                    meeting_title: row.get(2)?,
                    scheduled_date: row.get(3)?,
                    scheduled_time: row.get(4)?,
                    duration_minutes: row.get(5)?,
                    timezone: row.get(6)?,
                    google_event_id: row.get(7)?,
                    google_event_link: row.get(8)?,
                    tenant_email: row.get(9)?,
                    status: row.get(10)?,
                    created_at: row.get(11)?,
                })
            })
            .context("Failed to query bookings")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read booking row")
    }
}
