//! Persistent schema for project databases.
//!
//! Times are stored as integer frames at the owning entity's rate.
//! Deletion cascades from sequences through tracks to clips; clip
//! properties are managed explicitly by the clip's lifecycle.

use rusqlite::Connection;

use ripplecut_core::{EngineError, Result};

use crate::gateway::SqlExt;

/// Current schema version, written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id        TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    settings  TEXT
);

CREATE TABLE IF NOT EXISTS sequences (
    id                             TEXT PRIMARY KEY,
    project_id                     TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name                           TEXT NOT NULL,
    kind                           TEXT NOT NULL,
    fps_numerator                  INTEGER NOT NULL,
    fps_denominator                INTEGER NOT NULL,
    width                          INTEGER NOT NULL,
    height                         INTEGER NOT NULL,
    audio_rate                     INTEGER,
    playhead_value                 INTEGER NOT NULL DEFAULT 0,
    viewport_start_value           INTEGER NOT NULL DEFAULT 0,
    viewport_duration_frames_value INTEGER NOT NULL DEFAULT 0,
    mark_in_value                  INTEGER,
    mark_out_value                 INTEGER,
    timecode_start_frame           INTEGER NOT NULL DEFAULT 0,
    modified_at                    TEXT
);

CREATE TABLE IF NOT EXISTS tracks (
    id           TEXT PRIMARY KEY,
    sequence_id  TEXT NOT NULL REFERENCES sequences(id) ON DELETE CASCADE,
    track_type   TEXT NOT NULL,
    track_index  INTEGER NOT NULL,
    name         TEXT NOT NULL,
    height       INTEGER NOT NULL,
    UNIQUE (sequence_id, track_type, track_index)
);

CREATE TABLE IF NOT EXISTS clips (
    id                 TEXT PRIMARY KEY,
    project_id         TEXT NOT NULL,
    clip_kind          TEXT NOT NULL,
    track_id           TEXT REFERENCES tracks(id) ON DELETE CASCADE,
    owner_sequence_id  TEXT,
    parent_clip_id     TEXT,
    source_sequence_id TEXT,
    media_id           TEXT,
    name               TEXT NOT NULL,
    start_value        INTEGER NOT NULL,
    duration_value     INTEGER NOT NULL,
    source_in_value    INTEGER NOT NULL,
    source_out_value   INTEGER NOT NULL,
    enabled            INTEGER NOT NULL DEFAULT 1,
    offline            INTEGER NOT NULL DEFAULT 0,
    fps_numerator      INTEGER NOT NULL,
    fps_denominator    INTEGER NOT NULL,
    created_at         TEXT,
    modified_at        TEXT
);

CREATE INDEX IF NOT EXISTS idx_clips_track_start ON clips (track_id, start_value);
CREATE INDEX IF NOT EXISTS idx_clips_owner ON clips (owner_sequence_id);

CREATE TABLE IF NOT EXISTS media (
    id             TEXT PRIMARY KEY,
    project_id     TEXT NOT NULL,
    path           TEXT NOT NULL,
    has_video      INTEGER NOT NULL DEFAULT 0,
    has_audio      INTEGER NOT NULL DEFAULT 0,
    duration_value INTEGER NOT NULL,
    video_width    INTEGER,
    video_height   INTEGER,
    frame_rate_num INTEGER,
    frame_rate_den INTEGER,
    sample_rate    INTEGER,
    channels       INTEGER
);

CREATE TABLE IF NOT EXISTS properties (
    id            TEXT PRIMARY KEY,
    clip_id       TEXT NOT NULL,
    property_name TEXT NOT NULL,
    property_value TEXT NOT NULL,
    property_type TEXT NOT NULL,
    default_value TEXT,
    UNIQUE (clip_id, property_name)
);

CREATE TABLE IF NOT EXISTS bins (
    id           TEXT PRIMARY KEY,
    project_id   TEXT NOT NULL,
    parent_id    TEXT,
    name         TEXT NOT NULL,
    insert_index INTEGER NOT NULL DEFAULT 0
);
";

/// Create missing tables and stamp the schema version. Rejects databases
/// written by a newer engine.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_store()?;

    if version > SCHEMA_VERSION {
        return Err(EngineError::Store(format!(
            "project schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    conn.execute_batch(CREATE_TABLES).map_store()?;
    conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .map_store()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_future_version_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 999").unwrap();
        assert!(ensure_schema(&conn).is_err());
    }

    #[test]
    fn test_track_index_unique_per_kind() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute("INSERT INTO projects (id, name) VALUES ('p', 'p')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO sequences (id, project_id, name, kind, fps_numerator, fps_denominator, \
             width, height) VALUES ('s', 'p', 's', 'timeline', 30, 1, 1920, 1080)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tracks (id, sequence_id, track_type, track_index, name, height) \
             VALUES ('t1', 's', 'VIDEO', 1, 'V1', 48)",
            [],
        )
        .unwrap();
        // Same index, other kind: allowed.
        conn.execute(
            "INSERT INTO tracks (id, sequence_id, track_type, track_index, name, height) \
             VALUES ('t2', 's', 'AUDIO', 1, 'A1', 24)",
            [],
        )
        .unwrap();
        // Same kind and index: rejected.
        let dup = conn.execute(
            "INSERT INTO tracks (id, sequence_id, track_type, track_index, name, height) \
             VALUES ('t3', 's', 'VIDEO', 1, 'V1b', 48)",
            [],
        );
        assert!(dup.is_err());
    }
}
