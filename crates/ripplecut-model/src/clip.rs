//! Clip entity.
//!
//! A clip is one placed segment of media: a timeline position plus a
//! window into media space. Persisted timeline clips keep
//! `source_out = source_in + duration` and at least one frame of duration.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// Kind of clip row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Timeline,
    MasterclipStream,
    Master,
}

impl ClipKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClipKind::Timeline => "timeline",
            ClipKind::MasterclipStream => "masterclip_stream",
            ClipKind::Master => "master",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "timeline" => Ok(ClipKind::Timeline),
            "masterclip_stream" => Ok(ClipKind::MasterclipStream),
            "master" => Ok(ClipKind::Master),
            other => Err(EngineError::Store(format!("unknown clip kind: {}", other))),
        }
    }
}

/// A clip on a track (or a stream clip inside a masterclip sequence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: Uuid,
    pub project_id: Uuid,
    pub clip_kind: ClipKind,
    pub track_id: Option<Uuid>,
    pub owner_sequence_id: Uuid,
    pub parent_clip_id: Option<Uuid>,
    pub source_sequence_id: Option<Uuid>,
    pub media_id: Option<Uuid>,
    pub name: String,
    pub timeline_start: RationalTime,
    pub duration: RationalTime,
    pub source_in: RationalTime,
    pub source_out: RationalTime,
    pub enabled: bool,
    pub offline: bool,
    pub frame_rate: FrameRate,
}

impl Clip {
    /// Create a timeline clip value (not yet persisted).
    #[allow(clippy::too_many_arguments)]
    pub fn new_timeline(
        project_id: Uuid,
        owner_sequence_id: Uuid,
        track_id: Uuid,
        name: impl Into<String>,
        rate: FrameRate,
        timeline_start: RationalTime,
        duration: RationalTime,
        source_in: RationalTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            clip_kind: ClipKind::Timeline,
            track_id: Some(track_id),
            owner_sequence_id,
            parent_clip_id: None,
            source_sequence_id: None,
            media_id: None,
            name: name.into(),
            timeline_start: timeline_start.rescale(rate),
            duration: duration.rescale(rate),
            source_in: source_in.rescale(rate),
            source_out: (source_in + duration).rescale(rate),
            enabled: true,
            offline: false,
            frame_rate: rate,
        }
    }

    /// End of the clip interval on the timeline (exclusive).
    #[inline]
    pub fn end(&self) -> RationalTime {
        self.timeline_start + self.duration
    }

    /// Check the persisted-clip invariants.
    pub fn validate(&self) -> Result<()> {
        if self.duration.frames() < 1 {
            return Err(EngineError::InvariantViolation(format!(
                "clip {} duration must be at least one frame",
                self.id
            )));
        }
        if self.timeline_start.frames() < 0 {
            return Err(EngineError::InvariantViolation(format!(
                "clip {} starts before the timeline origin",
                self.id
            )));
        }
        if self.source_out != self.source_in + self.duration {
            return Err(EngineError::InvariantViolation(format!(
                "clip {} source window does not match its duration",
                self.id
            )));
        }
        Ok(())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<RawClip> {
        Ok(RawClip {
            id: row.get(0)?,
            project_id: row.get(1)?,
            clip_kind: row.get(2)?,
            track_id: row.get(3)?,
            owner_sequence_id: row.get(4)?,
            parent_clip_id: row.get(5)?,
            source_sequence_id: row.get(6)?,
            media_id: row.get(7)?,
            name: row.get(8)?,
            start_value: row.get(9)?,
            duration_value: row.get(10)?,
            source_in_value: row.get(11)?,
            source_out_value: row.get(12)?,
            enabled: row.get(13)?,
            offline: row.get(14)?,
            fps_numerator: row.get(15)?,
            fps_denominator: row.get(16)?,
        })
    }

    const COLUMNS: &'static str = "id, project_id, clip_kind, track_id, owner_sequence_id, \
         parent_clip_id, source_sequence_id, media_id, name, start_value, duration_value, \
         source_in_value, source_out_value, enabled, offline, fps_numerator, fps_denominator";

    /// Load a clip, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("clip {}", id)))
    }

    /// Load a clip if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM clips WHERE id = ?1", Self::COLUMNS);
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(RawClip::hydrate)
            .transpose()
    }

    /// All clips on a track, sorted by timeline start.
    pub fn load_for_track(store: &Store, track_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM clips WHERE track_id = ?1 ORDER BY start_value",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let rows = stmt
            .query_map(params![track_id.to_string()], Self::from_row)
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(RawClip::hydrate(row.map_store()?)?);
        }
        Ok(out)
    }

    /// Every placed clip of a sequence across all tracks, sorted by start.
    pub fn load_for_sequence(store: &Store, sequence_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM clips WHERE owner_sequence_id = ?1 AND track_id IS NOT NULL \
             ORDER BY start_value",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let rows = stmt
            .query_map(params![sequence_id.to_string()], Self::from_row)
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(RawClip::hydrate(row.map_store()?)?);
        }
        Ok(out)
    }

    /// Insert or update the clip row. Times are stored as integer frames
    /// at the clip rate.
    pub fn save(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO clips (id, project_id, clip_kind, track_id, \
                 owner_sequence_id, parent_clip_id, source_sequence_id, media_id, name, \
                 start_value, duration_value, source_in_value, source_out_value, enabled, \
                 offline, fps_numerator, fps_denominator, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, datetime('now'))",
                params![
                    self.id.to_string(),
                    self.project_id.to_string(),
                    self.clip_kind.as_str(),
                    self.track_id.map(|t| t.to_string()),
                    self.owner_sequence_id.to_string(),
                    self.parent_clip_id.map(|p| p.to_string()),
                    self.source_sequence_id.map(|s| s.to_string()),
                    self.media_id.map(|m| m.to_string()),
                    self.name,
                    self.timeline_start.rescale(self.frame_rate).frames(),
                    self.duration.rescale(self.frame_rate).frames(),
                    self.source_in.rescale(self.frame_rate).frames(),
                    self.source_out.rescale(self.frame_rate).frames(),
                    self.enabled,
                    self.offline,
                    self.frame_rate.numerator,
                    self.frame_rate.denominator,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the clip row and its properties.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM properties WHERE clip_id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        store
            .conn()
            .execute(
                "DELETE FROM clips WHERE id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        Ok(())
    }

    /// Snapshot for undo.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Write a snapshot back, restoring the row exactly.
    pub fn restore(snapshot: &Self, store: &Store) -> Result<()> {
        snapshot.save(store)
    }

    /// Move every clip on `track_id` whose start is at or past
    /// `start_frames` by `shift_frames`. Returns the number of rows moved.
    pub fn bulk_shift(
        store: &Store,
        track_id: Uuid,
        start_frames: i64,
        shift_frames: i64,
    ) -> Result<usize> {
        store
            .conn()
            .execute(
                "UPDATE clips SET start_value = start_value + ?1, modified_at = datetime('now') \
                 WHERE track_id = ?2 AND start_value >= ?3",
                params![shift_frames, track_id.to_string(), start_frames],
            )
            .map_store()
    }
}

/// Row image before uuid/kind/rate hydration.
struct RawClip {
    id: String,
    project_id: String,
    clip_kind: String,
    track_id: Option<String>,
    owner_sequence_id: Option<String>,
    parent_clip_id: Option<String>,
    source_sequence_id: Option<String>,
    media_id: Option<String>,
    name: String,
    start_value: i64,
    duration_value: i64,
    source_in_value: i64,
    source_out_value: i64,
    enabled: bool,
    offline: bool,
    fps_numerator: u32,
    fps_denominator: u32,
}

impl RawClip {
    fn hydrate(self) -> Result<Clip> {
        let rate = FrameRate::new(self.fps_numerator.max(1), self.fps_denominator.max(1));
        let owner = self
            .owner_sequence_id
            .ok_or_else(|| EngineError::Store("clip row without owner sequence".into()))?;
        Ok(Clip {
            id: parse_uuid(&self.id, "clip")?,
            project_id: parse_uuid(&self.project_id, "project")?,
            clip_kind: ClipKind::parse(&self.clip_kind)?,
            track_id: self
                .track_id
                .as_deref()
                .map(|t| parse_uuid(t, "track"))
                .transpose()?,
            owner_sequence_id: parse_uuid(&owner, "sequence")?,
            parent_clip_id: self
                .parent_clip_id
                .as_deref()
                .map(|p| parse_uuid(p, "clip"))
                .transpose()?,
            source_sequence_id: self
                .source_sequence_id
                .as_deref()
                .map(|s| parse_uuid(s, "sequence"))
                .transpose()?,
            media_id: self
                .media_id
                .as_deref()
                .map(|m| parse_uuid(m, "media"))
                .transpose()?,
            name: self.name,
            timeline_start: RationalTime::from_frames(self.start_value, rate),
            duration: RationalTime::from_frames(self.duration_value, rate),
            source_in: RationalTime::from_frames(self.source_in_value, rate),
            source_out: RationalTime::from_frames(self.source_out_value, rate),
            enabled: self.enabled,
            offline: self.offline,
            frame_rate: rate,
        })
    }
}
