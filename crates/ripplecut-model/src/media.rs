//! Media entity.
//!
//! One row per imported file. The stored duration is the authoritative
//! media boundary used by ripple-out limits.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// An imported media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub project_id: Uuid,
    pub path: String,
    pub has_video: bool,
    pub has_audio: bool,
    /// Authoritative duration, in frames at `frame_rate` (or the audio
    /// rate mapped to frames for audio-only files).
    pub duration: RationalTime,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub frame_rate: FrameRate,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl Media {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, Media)> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(1)?;
        let num: Option<u32> = row.get(8)?;
        let den: Option<u32> = row.get(9)?;
        let rate = FrameRate::new(num.unwrap_or(30).max(1), den.unwrap_or(1).max(1));
        let media = Media {
            id: Uuid::nil(),
            project_id: Uuid::nil(),
            path: row.get(2)?,
            has_video: row.get(3)?,
            has_audio: row.get(4)?,
            duration: RationalTime::from_frames(row.get(5)?, rate),
            video_width: row.get(6)?,
            video_height: row.get(7)?,
            frame_rate: rate,
            sample_rate: row.get(10)?,
            channels: row.get(11)?,
        };
        Ok((id, project_id, media))
    }

    fn hydrate((id, project_id, mut media): (String, String, Media)) -> Result<Media> {
        media.id = parse_uuid(&id, "media")?;
        media.project_id = parse_uuid(&project_id, "project")?;
        Ok(media)
    }

    const COLUMNS: &'static str = "id, project_id, path, has_video, has_audio, duration_value, \
         video_width, video_height, frame_rate_num, frame_rate_den, sample_rate, channels";

    /// Load a media row, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("media {}", id)))
    }

    /// Load a media row if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM media WHERE id = ?1", Self::COLUMNS);
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate)
            .transpose()
    }

    /// Find a media row by file path within a project. Import is
    /// idempotent per path.
    pub fn find_by_path(store: &Store, project_id: Uuid, path: &str) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {} FROM media WHERE project_id = ?1 AND path = ?2",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![project_id.to_string(), path], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate)
            .transpose()
    }

    /// Insert or update the media row.
    pub fn save(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO media (id, project_id, path, has_video, has_audio, \
                 duration_value, video_width, video_height, frame_rate_num, frame_rate_den, \
                 sample_rate, channels) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    self.id.to_string(),
                    self.project_id.to_string(),
                    self.path,
                    self.has_video,
                    self.has_audio,
                    self.duration.rescale(self.frame_rate).frames(),
                    self.video_width,
                    self.video_height,
                    self.frame_rate.numerator,
                    self.frame_rate.denominator,
                    self.sample_rate,
                    self.channels,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the media row.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM media WHERE id = ?1",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn media(project_id: Uuid, path: &str) -> Media {
        Media {
            id: Uuid::new_v4(),
            project_id,
            path: path.into(),
            has_video: true,
            has_audio: true,
            duration: RationalTime::new(3600, 30, 1),
            video_width: Some(1920),
            video_height: Some(1080),
            frame_rate: FrameRate::FPS_30,
            sample_rate: Some(48000),
            channels: Some(2),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let p = Project::new("p");
        p.save(&store).unwrap();
        let m = media(p.id, "footage/a.mp4");
        m.save(&store).unwrap();
        assert_eq!(Media::load(&store, m.id).unwrap(), m);
    }

    #[test]
    fn test_find_by_path() {
        let store = Store::open_in_memory().unwrap();
        let p = Project::new("p");
        p.save(&store).unwrap();
        let m = media(p.id, "footage/b.mp4");
        m.save(&store).unwrap();

        let found = Media::find_by_path(&store, p.id, "footage/b.mp4").unwrap();
        assert_eq!(found, Some(m));
        assert!(Media::find_by_path(&store, p.id, "missing.mp4")
            .unwrap()
            .is_none());
    }
}
