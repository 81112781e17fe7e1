use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::error::StoreError;

/// Initialise the outbox schema in `conn`. Safe to call on every startup.
///
/// Timestamps are fixed-width RFC 3339 UTC strings (see [`format_ts`]) so that
/// `ORDER BY created_at` and `ORDER BY sent_at` sort chronologically.
pub fn init_db(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            content     TEXT    NOT NULL,
            author      TEXT    NOT NULL,
            sent        INTEGER NOT NULL DEFAULT 0,
            sent_at     TEXT,               -- set iff sent = 1
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL,
            CHECK ((sent = 1) = (sent_at IS NOT NULL))
        ) STRICT;

        -- Oldest-first pickup of pending rows.
        CREATE INDEX IF NOT EXISTS idx_messages_unsent
            ON messages (created_at, id) WHERE sent = 0;

        CREATE INDEX IF NOT EXISTS idx_messages_sent_at
            ON messages (sent_at DESC) WHERE sent = 1;
        ",
    )?;
    Ok(())
}

/// Open (or create) the database file and apply connection pragmas + schema.
pub fn open(path: &str) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
    )?;
    init_db(&conn)?;
    Ok(conn)
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn sent_flag_without_timestamp_violates_check() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let now = format_ts(Utc::now());
        let res = conn.execute(
            "INSERT INTO messages (content, author, sent, sent_at, created_at, updated_at)
             VALUES ('x', 'y', 1, NULL, ?1, ?1)",
            [&now],
        );
        assert!(res.is_err());
    }

    #[test]
    fn timestamps_are_fixed_width_and_round_trip() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let (a, b) = (format_ts(early), format_ts(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_ts(0, &a).unwrap(), early);
    }
}
