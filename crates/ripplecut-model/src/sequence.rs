//! Sequence entity.
//!
//! A *timeline* sequence is the user-edited composition; a *masterclip*
//! sequence encapsulates the streams of one imported media file and acts
//! as the master clip for timeline clips created from it.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// Kind of sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Timeline,
    Masterclip,
    Master,
}

impl SequenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Timeline => "timeline",
            SequenceKind::Masterclip => "masterclip",
            SequenceKind::Master => "master",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "timeline" => Ok(SequenceKind::Timeline),
            "masterclip" => Ok(SequenceKind::Masterclip),
            "master" => Ok(SequenceKind::Master),
            other => Err(EngineError::Store(format!(
                "unknown sequence kind: {}",
                other
            ))),
        }
    }
}

/// A sequence: a stack of parallel tracks at one frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub kind: SequenceKind,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    pub audio_rate: Option<u32>,
    pub playhead: RationalTime,
    pub viewport_start: RationalTime,
    pub viewport_duration: RationalTime,
    pub mark_in: Option<RationalTime>,
    pub mark_out: Option<RationalTime>,
    pub timecode_start_frame: i64,
}

impl Sequence {
    /// Create a new timeline sequence value (not yet persisted).
    pub fn new(
        project_id: Uuid,
        name: impl Into<String>,
        frame_rate: FrameRate,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            kind: SequenceKind::Timeline,
            frame_rate,
            width,
            height,
            audio_rate: None,
            playhead: RationalTime::zero(frame_rate),
            viewport_start: RationalTime::zero(frame_rate),
            viewport_duration: RationalTime::from_frames(0, frame_rate),
            mark_in: None,
            mark_out: None,
            timecode_start_frame: 0,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(Self, String, String, String)> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(1)?;
        let name: String = row.get(2)?;
        let kind: String = row.get(3)?;
        let fps_num: u32 = row.get(4)?;
        let fps_den: u32 = row.get(5)?;
        let rate = FrameRate::new(fps_num.max(1), fps_den.max(1));
        let seq = Self {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            name,
            kind: SequenceKind::Timeline,
            frame_rate: rate,
            width: row.get(6)?,
            height: row.get(7)?,
            audio_rate: row.get(8)?,
            playhead: RationalTime::from_frames(row.get(9)?, rate),
            viewport_start: RationalTime::from_frames(row.get(10)?, rate),
            viewport_duration: RationalTime::from_frames(row.get(11)?, rate),
            mark_in: row
                .get::<_, Option<i64>>(12)?
                .map(|f| RationalTime::from_frames(f, rate)),
            mark_out: row
                .get::<_, Option<i64>>(13)?
                .map(|f| RationalTime::from_frames(f, rate)),
            timecode_start_frame: row.get(14)?,
        };
        Ok((seq, id, project_id, kind))
    }

    const COLUMNS: &'static str = "id, project_id, name, kind, fps_numerator, fps_denominator, \
         width, height, audio_rate, playhead_value, viewport_start_value, \
         viewport_duration_frames_value, mark_in_value, mark_out_value, timecode_start_frame";

    /// Load a sequence, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("sequence {}", id)))
    }

    /// Load a sequence if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM sequences WHERE id = ?1", Self::COLUMNS);
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate_ids)
            .transpose()
    }

    /// All sequences of a project, ordered by name.
    pub fn load_for_project(store: &Store, project_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM sequences WHERE project_id = ?1 ORDER BY name",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let rows = stmt
            .query_map(params![project_id.to_string()], Self::from_row)
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Self::hydrate_ids(row.map_store()?)?);
        }
        Ok(out)
    }

    /// Find the masterclip sequence for a media id, if one exists.
    pub fn find_masterclip_for_media(store: &Store, media_id: Uuid) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {} FROM sequences WHERE kind = 'masterclip' AND id IN \
             (SELECT DISTINCT owner_sequence_id FROM clips WHERE media_id = ?1 \
              AND owner_sequence_id IS NOT NULL)",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![media_id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate_ids)
            .transpose()
    }

    fn hydrate_ids((mut seq, id, project_id, kind): (Self, String, String, String)) -> Result<Self> {
        seq.id = parse_uuid(&id, "sequence")?;
        seq.project_id = parse_uuid(&project_id, "project")?;
        seq.kind = SequenceKind::parse(&kind)?;
        Ok(seq)
    }

    /// Insert or update the sequence row. Times are stored as integer
    /// frames at the sequence rate.
    pub fn save(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO sequences (id, project_id, name, kind, fps_numerator, \
                 fps_denominator, width, height, audio_rate, playhead_value, \
                 viewport_start_value, viewport_duration_frames_value, mark_in_value, \
                 mark_out_value, timecode_start_frame, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 datetime('now'))",
                params![
                    self.id.to_string(),
                    self.project_id.to_string(),
                    self.name,
                    self.kind.as_str(),
                    self.frame_rate.numerator,
                    self.frame_rate.denominator,
                    self.width,
                    self.height,
                    self.audio_rate,
                    self.playhead.rescale(self.frame_rate).frames(),
                    self.viewport_start.rescale(self.frame_rate).frames(),
                    self.viewport_duration.rescale(self.frame_rate).frames(),
                    self.mark_in.map(|t| t.rescale(self.frame_rate).frames()),
                    self.mark_out.map(|t| t.rescale(self.frame_rate).frames()),
                    self.timecode_start_frame,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the sequence row; tracks and clips cascade.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM sequences WHERE id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        Ok(())
    }

    /// Snapshot for undo.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Latest clip end across every track of this sequence, in the
    /// sequence rate. Zero for an empty sequence.
    pub fn duration(&self, store: &Store) -> Result<RationalTime> {
        let frames: Option<i64> = store
            .conn()
            .query_row(
                "SELECT MAX(start_value + duration_value) FROM clips \
                 WHERE owner_sequence_id = ?1 AND track_id IS NOT NULL",
                params![self.id.to_string()],
                |row| row.get(0),
            )
            .map_store()?;
        Ok(RationalTime::from_frames(
            frames.unwrap_or(0),
            self.frame_rate,
        ))
    }

    /// Every distinct edit point (clip start or end) in the sequence,
    /// ascending. Used by edit-point navigation.
    pub fn edit_points(&self, store: &Store) -> Result<Vec<i64>> {
        let mut stmt = store
            .conn()
            .prepare(
                "SELECT DISTINCT v FROM (SELECT start_value AS v FROM clips \
                 WHERE owner_sequence_id = ?1 AND track_id IS NOT NULL \
                 UNION SELECT start_value + duration_value FROM clips \
                 WHERE owner_sequence_id = ?1 AND track_id IS NOT NULL) ORDER BY v",
            )
            .map_store()?;
        let rows = stmt
            .query_map(params![self.id.to_string()], |row| row.get::<_, i64>(0))
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_store()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(store: &Store) -> Uuid {
        let p = crate::project::Project::new("p");
        p.save(store).unwrap();
        p.id
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let pid = project(&store);
        let mut seq = Sequence::new(pid, "Main", FrameRate::FPS_30, 1920, 1080);
        seq.mark_in = Some(RationalTime::new(10, 30, 1));
        seq.save(&store).unwrap();

        let loaded = Sequence::load(&store, seq.id).unwrap();
        assert_eq!(loaded, seq);
    }

    #[test]
    fn test_kind_parse_rejects_unknown() {
        assert!(SequenceKind::parse("bogus").is_err());
        assert_eq!(
            SequenceKind::parse("masterclip").unwrap(),
            SequenceKind::Masterclip
        );
    }

    #[test]
    fn test_duration_empty_sequence() {
        let store = Store::open_in_memory().unwrap();
        let pid = project(&store);
        let seq = Sequence::new(pid, "Empty", FrameRate::FPS_30, 1920, 1080);
        seq.save(&store).unwrap();
        assert_eq!(seq.duration(&store).unwrap().frames(), 0);
    }
}
