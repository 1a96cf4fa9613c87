//! Media import and master-clip commands.
//!
//! Import probes each file and ensures one *masterclip sequence* per
//! media row: a sequence that IS the master clip, holding one video
//! stream clip and N audio stream clips spanning the media duration.
//! Import is idempotent per media; every generated id is persisted for
//! deterministic undo (reverse creation order) and replay.

use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result};
use ripplecut_media::ProbedMedia;
use ripplecut_model::{
    Clip, ClipKind, Media, Project, Property, Sequence, SequenceKind, Track, TrackKind,
};

use crate::command::{CommandState, ImportedFile};
use crate::registry::Engine;

pub(crate) fn import_media(
    engine: &mut Engine,
    project_id: Uuid,
    paths: &[String],
    state: &mut CommandState,
) -> Result<()> {
    if paths.is_empty() {
        return Err(EngineError::MissingParameter("file_paths".into()));
    }
    Project::load(&engine.store, project_id)?;

    let persisted: Vec<ImportedFile> = match state {
        CommandState::ImportMedia { files } => files.clone(),
        _ => Vec::new(),
    };

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let probed = engine.prober.probe(Path::new(path))?;
        let replayed = persisted.iter().find(|f| &f.path == path).cloned();
        files.push(import_one(engine, project_id, path, &probed, replayed)?);
    }

    *state = CommandState::ImportMedia { files };
    Ok(())
}

fn import_one(
    engine: &mut Engine,
    project_id: Uuid,
    path: &str,
    probed: &ProbedMedia,
    replayed: Option<ImportedFile>,
) -> Result<ImportedFile> {
    let rate = probed.timeline_rate();
    let audio_rate = probed.primary_audio().map(|a| a.sample_rate);

    // Media row: idempotent per path.
    let existing_media = Media::find_by_path(&engine.store, project_id, path)?;
    let created_media = existing_media.is_none();
    let media = match existing_media {
        Some(media) => media,
        None => {
            let media = Media {
                id: replayed.as_ref().map(|f| f.media_id).unwrap_or_else(Uuid::new_v4),
                project_id,
                path: path.to_string(),
                has_video: probed.has_video(),
                has_audio: probed.has_audio(),
                duration: probed.duration.rescale(rate),
                video_width: probed.primary_video().map(|v| v.width),
                video_height: probed.primary_video().map(|v| v.height),
                frame_rate: rate,
                sample_rate: audio_rate,
                channels: probed.primary_audio().map(|a| a.channels),
            };
            media.save(&engine.store)?;
            media
        }
    };

    // Masterclip sequence: reuse when present; refresh its rate when the
    // probe disagrees.
    if let Some(mut master) = Sequence::find_masterclip_for_media(&engine.store, media.id)? {
        let mut previous_rate = None;
        if master.frame_rate != rate {
            previous_rate = Some((master.frame_rate.numerator, master.frame_rate.denominator));
            info!(sequence = %master.id, "masterclip rate updated from probe");
            master.frame_rate = rate;
            master.save(&engine.store)?;
        }
        return Ok(ImportedFile {
            path: path.to_string(),
            media_id: media.id,
            masterclip_sequence_id: master.id,
            video_track_id: None,
            video_clip_id: None,
            audio_track_ids: Vec::new(),
            audio_clip_ids: Vec::new(),
            created_media,
            created_sequence: false,
            previous_rate,
        });
    }

    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let mut master = Sequence::new(
        project_id,
        &name,
        rate,
        probed.primary_video().map(|v| v.width).unwrap_or(0),
        probed.primary_video().map(|v| v.height).unwrap_or(0),
    );
    master.kind = SequenceKind::Masterclip;
    master.audio_rate = audio_rate;
    if let Some(f) = &replayed {
        master.id = f.masterclip_sequence_id;
    }
    master.save(&engine.store)?;

    let duration = media.duration.rescale(rate);
    let make_stream = |id: Uuid, track_id: Uuid, index: usize| -> Clip {
        let mut clip = Clip::new_timeline(
            project_id,
            master.id,
            track_id,
            if index == 0 {
                name.clone()
            } else {
                format!("{} A{}", name, index)
            },
            rate,
            RationalTime::zero(rate),
            duration,
            RationalTime::zero(rate),
        );
        clip.id = id;
        clip.clip_kind = ClipKind::MasterclipStream;
        clip.media_id = Some(media.id);
        clip
    };

    let mut video_track_id = None;
    let mut video_clip_id = None;
    if probed.has_video() {
        let mut track = Track::new(master.id, TrackKind::Video, 1, 48);
        if let Some(id) = replayed.as_ref().and_then(|f| f.video_track_id) {
            track.id = id;
        }
        track.save(&engine.store)?;
        let clip_id = replayed
            .as_ref()
            .and_then(|f| f.video_clip_id)
            .unwrap_or_else(Uuid::new_v4);
        make_stream(clip_id, track.id, 0).save(&engine.store)?;
        video_track_id = Some(track.id);
        video_clip_id = Some(clip_id);
    }

    let mut audio_track_ids = Vec::new();
    let mut audio_clip_ids = Vec::new();
    for (i, _stream) in probed.audio_streams.iter().enumerate() {
        let mut track = Track::new(master.id, TrackKind::Audio, (i + 1) as u32, 32);
        if let Some(id) = replayed.as_ref().and_then(|f| f.audio_track_ids.get(i)) {
            track.id = *id;
        }
        track.save(&engine.store)?;
        let clip_id = replayed
            .as_ref()
            .and_then(|f| f.audio_clip_ids.get(i).copied())
            .unwrap_or_else(Uuid::new_v4);
        make_stream(clip_id, track.id, i + 1).save(&engine.store)?;
        audio_track_ids.push(track.id);
        audio_clip_ids.push(clip_id);
    }
    info!(media = %media.id, sequence = %master.id, path, "imported media");

    Ok(ImportedFile {
        path: path.to_string(),
        media_id: media.id,
        masterclip_sequence_id: master.id,
        video_track_id,
        video_clip_id,
        audio_track_ids,
        audio_clip_ids,
        created_media,
        created_sequence: true,
        previous_rate: None,
    })
}

/// Undo deletes everything created, in reverse creation order; imports
/// that only refreshed a rate restore the previous one.
pub(crate) fn undo_import_media(engine: &mut Engine, files: &[ImportedFile]) -> Result<()> {
    for file in files.iter().rev() {
        if file.created_sequence {
            let clip_ids: Vec<Uuid> = file
                .audio_clip_ids
                .iter()
                .rev()
                .chain(file.video_clip_id.iter())
                .copied()
                .collect();
            for clip_id in clip_ids {
                if let Some(clip) = Clip::load_optional(&engine.store, clip_id)? {
                    clip.delete(&engine.store)?;
                }
            }
            if let Some(seq) =
                Sequence::load_optional(&engine.store, file.masterclip_sequence_id)?
            {
                seq.delete(&engine.store)?;
            }
        } else if let Some((num, den)) = file.previous_rate {
            if let Some(mut seq) =
                Sequence::load_optional(&engine.store, file.masterclip_sequence_id)?
            {
                seq.frame_rate = FrameRate::new(num, den);
                seq.save(&engine.store)?;
            }
        }
        if file.created_media {
            if let Some(media) = Media::load_optional(&engine.store, file.media_id)? {
                media.delete(&engine.store)?;
            }
        }
    }
    Ok(())
}

/// Copy a masterclip sequence with its tracks, stream clips, and clip
/// properties under fresh (persisted) ids.
pub(crate) fn duplicate_master_clip(
    engine: &mut Engine,
    masterclip_sequence_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let source = Sequence::load(&engine.store, masterclip_sequence_id)?;
    if source.kind != SequenceKind::Masterclip {
        return Err(EngineError::ConstraintViolation(format!(
            "sequence {} is not a master clip",
            masterclip_sequence_id
        )));
    }

    let (seq_id, persisted_tracks, persisted_clips) = match state {
        CommandState::DuplicateMasterClip {
            sequence_id,
            track_ids,
            clip_ids,
        } => (Some(*sequence_id), track_ids.clone(), clip_ids.clone()),
        _ => (None, Vec::new(), Vec::new()),
    };

    let mut copy = source.clone();
    copy.id = seq_id.unwrap_or_else(Uuid::new_v4);
    copy.name = format!("{} copy", source.name);
    copy.save(&engine.store)?;

    let tracks = Track::load_for_sequence(&engine.store, masterclip_sequence_id)?;
    let clips = Clip::load_for_sequence(&engine.store, masterclip_sequence_id)?;

    let mut track_ids = Vec::with_capacity(tracks.len());
    let mut track_map = std::collections::HashMap::new();
    for (i, track) in tracks.iter().enumerate() {
        let mut t = track.clone();
        t.id = persisted_tracks.get(i).copied().unwrap_or_else(Uuid::new_v4);
        t.sequence_id = copy.id;
        t.save(&engine.store)?;
        track_map.insert(track.id, t.id);
        track_ids.push(t.id);
    }

    let mut clip_ids = Vec::with_capacity(clips.len());
    for (i, clip) in clips.iter().enumerate() {
        let mut c = clip.clone();
        c.id = persisted_clips.get(i).copied().unwrap_or_else(Uuid::new_v4);
        c.owner_sequence_id = copy.id;
        c.track_id = clip.track_id.and_then(|t| track_map.get(&t).copied());
        c.save(&engine.store)?;
        Property::copy_all(&engine.store, clip.id, c.id)?;
        clip_ids.push(c.id);
    }
    info!(source = %masterclip_sequence_id, copy = %copy.id, "duplicated master clip");

    *state = CommandState::DuplicateMasterClip {
        sequence_id: copy.id,
        track_ids,
        clip_ids,
    };
    Ok(())
}

pub(crate) fn undo_duplicate_master_clip(
    engine: &mut Engine,
    sequence_id: Uuid,
    clip_ids: &[Uuid],
) -> Result<()> {
    // Clip properties do not cascade with the sequence row.
    for clip_id in clip_ids {
        if let Some(clip) = Clip::load_optional(&engine.store, *clip_id)? {
            clip.delete(&engine.store)?;
        }
    }
    if let Some(seq) = Sequence::load_optional(&engine.store, sequence_id)? {
        seq.delete(&engine.store)?;
    }
    Ok(())
}

/// Delete a masterclip sequence, refusing while timeline clips still
/// reference it.
pub(crate) fn delete_master_clip(
    engine: &mut Engine,
    masterclip_sequence_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let seq = Sequence::load(&engine.store, masterclip_sequence_id)?;
    if seq.kind != SequenceKind::Masterclip {
        return Err(EngineError::ConstraintViolation(format!(
            "sequence {} is not a master clip",
            masterclip_sequence_id
        )));
    }
    let referencing: i64 = engine
        .store
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM clips WHERE source_sequence_id = ?1",
            rusqlite::params![masterclip_sequence_id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| EngineError::Store(e.to_string()))?;
    if referencing > 0 {
        return Err(EngineError::ConstraintViolation(format!(
            "{} timeline clips still reference master clip {}",
            referencing, masterclip_sequence_id
        )));
    }

    let tracks = Track::load_for_sequence(&engine.store, masterclip_sequence_id)?;
    let clips = Clip::load_for_sequence(&engine.store, masterclip_sequence_id)?;
    let mut properties = Vec::new();
    for clip in &clips {
        let props = Property::load_for_clip(&engine.store, clip.id)?;
        for prop in &props {
            prop.delete(&engine.store)?;
        }
        properties.extend(props);
    }
    seq.delete(&engine.store)?;
    warn!(sequence = %masterclip_sequence_id, "deleted master clip");

    *state = CommandState::DeleteSequence {
        sequence: seq,
        tracks,
        clips,
        properties,
    };
    Ok(())
}
