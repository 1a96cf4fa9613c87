//! Track entity.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Video => "VIDEO",
            TrackKind::Audio => "AUDIO",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "VIDEO" => Ok(TrackKind::Video),
            "AUDIO" => Ok(TrackKind::Audio),
            other => Err(EngineError::Store(format!("unknown track type: {}", other))),
        }
    }

    /// Display prefix: V1, V2, ... / A1, A2, ...
    pub fn prefix(self) -> &'static str {
        match self {
            TrackKind::Video => "V",
            TrackKind::Audio => "A",
        }
    }
}

/// A track within a sequence. `(kind, index)` is unique per sequence and
/// `index` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub kind: TrackKind,
    pub index: u32,
    pub name: String,
    /// Lane height in pixels.
    pub height: u32,
}

impl Track {
    /// Create a new track value (not yet persisted) named after its
    /// kind and index (V1, A2, ...).
    pub fn new(sequence_id: Uuid, kind: TrackKind, index: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence_id,
            kind,
            index,
            name: format!("{}{}", kind.prefix(), index),
            height,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, u32, String, u32)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn hydrate(
        (id, sequence_id, kind, index, name, height): (String, String, String, u32, String, u32),
    ) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&id, "track")?,
            sequence_id: parse_uuid(&sequence_id, "sequence")?,
            kind: TrackKind::parse(&kind)?,
            index,
            name,
            height,
        })
    }

    const COLUMNS: &'static str = "id, sequence_id, track_type, track_index, name, height";

    /// Load a track, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("track {}", id)))
    }

    /// Load a track if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM tracks WHERE id = ?1", Self::COLUMNS);
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate)
            .transpose()
    }

    /// All tracks of a sequence, video first, then by index.
    pub fn load_for_sequence(store: &Store, sequence_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM tracks WHERE sequence_id = ?1 \
             ORDER BY track_type DESC, track_index",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let rows = stmt
            .query_map(params![sequence_id.to_string()], Self::from_row)
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Self::hydrate(row.map_store()?)?);
        }
        Ok(out)
    }

    /// Next free index for a track kind within a sequence.
    pub fn next_index(store: &Store, sequence_id: Uuid, kind: TrackKind) -> Result<u32> {
        let max: Option<u32> = store
            .conn()
            .query_row(
                "SELECT MAX(track_index) FROM tracks WHERE sequence_id = ?1 AND track_type = ?2",
                params![sequence_id.to_string(), kind.as_str()],
                |row| row.get(0),
            )
            .map_store()?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Insert or update the track row.
    pub fn save(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO tracks (id, sequence_id, track_type, track_index, \
                 name, height) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.id.to_string(),
                    self.sequence_id.to_string(),
                    self.kind.as_str(),
                    self.index,
                    self.name,
                    self.height,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the track row; clips on it cascade.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM tracks WHERE id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        Ok(())
    }

    /// Snapshot for undo.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
