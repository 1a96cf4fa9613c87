//! Sequence-level commands.

use tracing::info;
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result, TimeValue};
use ripplecut_model::{Clip, Project, Property, Sequence, Track, TrackKind};

use crate::command::{CommandState, RateValue};
use crate::registry::Engine;

use super::stable_id;

/// Fields SetSequenceMetadata may write. `mark_in`/`mark_out` accept a
/// null sentinel that clears them.
const WRITABLE_FIELDS: &[&str] = &[
    "name",
    "frame_rate",
    "width",
    "height",
    "timecode_start_frame",
    "playhead",
    "viewport_start",
    "viewport_duration",
    "mark_in",
    "mark_out",
];

pub(crate) fn create_sequence(
    engine: &mut Engine,
    project_id: Uuid,
    name: &str,
    rate: FrameRate,
    width: u32,
    height: u32,
    state: &mut CommandState,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EngineError::MissingParameter("name".into()));
    }
    let project = Project::load(&engine.store, project_id)?;

    let (mut seq_slot, track_ids) = match state {
        CommandState::CreateSequence {
            sequence_id,
            track_ids,
        } => (Some(*sequence_id), track_ids.clone()),
        _ => (None, Vec::new()),
    };

    let mut seq = Sequence::new(project.id, name, rate, width, height);
    seq.id = stable_id(&mut seq_slot);
    seq.save(&engine.store)?;

    let created = create_default_tracks(engine, &seq, &project, &track_ids)?;
    engine
        .bucket
        .sequence_meta(seq.id, "created", serde_json::Value::Null);
    info!(sequence = %seq.id, name, "created sequence");

    *state = CommandState::CreateSequence {
        sequence_id: seq.id,
        track_ids: created,
    };
    Ok(())
}

/// Six default tracks: V1..V3 and A1..A3 at template heights.
pub(crate) fn create_default_tracks(
    engine: &mut Engine,
    seq: &Sequence,
    project: &Project,
    persisted_ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    let mut created = Vec::with_capacity(6);
    let specs = [
        (TrackKind::Video, 1),
        (TrackKind::Video, 2),
        (TrackKind::Video, 3),
        (TrackKind::Audio, 1),
        (TrackKind::Audio, 2),
        (TrackKind::Audio, 3),
    ];
    for (i, (kind, index)) in specs.into_iter().enumerate() {
        let mut track = Track::new(seq.id, kind, index, super::project::template_height(project, kind));
        if let Some(id) = persisted_ids.get(i) {
            track.id = *id;
        }
        track.save(&engine.store)?;
        created.push(track.id);
    }
    Ok(created)
}

pub(crate) fn undo_create_sequence(engine: &mut Engine, sequence_id: Uuid) -> Result<()> {
    if let Some(seq) = Sequence::load_optional(&engine.store, sequence_id)? {
        seq.delete(&engine.store)?;
    }
    Ok(())
}

pub(crate) fn set_sequence_metadata(
    engine: &mut Engine,
    sequence_id: Uuid,
    field: &str,
    value: serde_json::Value,
    state: &mut CommandState,
) -> Result<()> {
    if !WRITABLE_FIELDS.contains(&field) {
        return Err(EngineError::ConstraintViolation(format!(
            "field {} is not writable",
            field
        )));
    }
    let mut seq = Sequence::load(&engine.store, sequence_id)?;
    let rate = seq.frame_rate;

    let previous = read_field(&seq, field);
    let as_time = |v: &serde_json::Value| -> Result<RationalTime> {
        let tv: TimeValue = serde_json::from_value(v.clone())
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        Ok(tv.hydrate(rate))
    };
    let as_u32 = |v: &serde_json::Value, what: &str| -> Result<u32> {
        v.as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| EngineError::ConstraintViolation(format!("{} must be a number", what)))
    };

    match field {
        "name" => {
            let name = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| EngineError::ConstraintViolation("name must be non-empty".into()))?;
            seq.name = name.to_string();
        }
        "frame_rate" => {
            let rv: RateValue = serde_json::from_value(value.clone())
                .map_err(|e| EngineError::Serialization(e.to_string()))?;
            seq.frame_rate = rv.to_rate();
        }
        "width" => seq.width = as_u32(&value, "width")?,
        "height" => seq.height = as_u32(&value, "height")?,
        "timecode_start_frame" => {
            seq.timecode_start_frame = value.as_i64().ok_or_else(|| {
                EngineError::ConstraintViolation("timecode_start_frame must be a number".into())
            })?;
        }
        "playhead" => seq.playhead = as_time(&value)?,
        "viewport_start" => seq.viewport_start = as_time(&value)?,
        "viewport_duration" => seq.viewport_duration = as_time(&value)?,
        "mark_in" => {
            seq.mark_in = if value.is_null() {
                None
            } else {
                Some(as_time(&value)?)
            };
        }
        "mark_out" => {
            seq.mark_out = if value.is_null() {
                None
            } else {
                Some(as_time(&value)?)
            };
        }
        _ => unreachable!("field checked against whitelist"),
    }
    seq.save(&engine.store)?;
    engine
        .bucket
        .sequence_meta(sequence_id, "updated", serde_json::json!({"field": field}));

    *state = CommandState::SetSequenceMetadata { previous };
    Ok(())
}

fn read_field(seq: &Sequence, field: &str) -> serde_json::Value {
    let time = |t: RationalTime| serde_json::json!(t.frames());
    match field {
        "name" => serde_json::json!(seq.name),
        "frame_rate" => serde_json::json!({
            "num": seq.frame_rate.numerator,
            "den": seq.frame_rate.denominator,
        }),
        "width" => serde_json::json!(seq.width),
        "height" => serde_json::json!(seq.height),
        "timecode_start_frame" => serde_json::json!(seq.timecode_start_frame),
        "playhead" => time(seq.playhead),
        "viewport_start" => time(seq.viewport_start),
        "viewport_duration" => time(seq.viewport_duration),
        "mark_in" => seq.mark_in.map(time).unwrap_or(serde_json::Value::Null),
        "mark_out" => seq.mark_out.map(time).unwrap_or(serde_json::Value::Null),
        _ => serde_json::Value::Null,
    }
}

pub(crate) fn undo_set_sequence_metadata(
    engine: &mut Engine,
    sequence_id: Uuid,
    field: &str,
    previous: serde_json::Value,
) -> Result<()> {
    let mut throwaway = CommandState::Empty;
    set_sequence_metadata(engine, sequence_id, field, previous, &mut throwaway)
}

pub(crate) fn delete_sequence(
    engine: &mut Engine,
    sequence_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let seq = Sequence::load(&engine.store, sequence_id)?;
    let tracks = Track::load_for_sequence(&engine.store, sequence_id)?;
    let clips = Clip::load_for_sequence(&engine.store, sequence_id)?;
    let mut properties = Vec::new();
    for clip in &clips {
        // Property rows do not cascade with the sequence.
        let props = Property::load_for_clip(&engine.store, clip.id)?;
        for prop in &props {
            prop.delete(&engine.store)?;
        }
        properties.extend(props);
    }
    seq.delete(&engine.store)?;
    engine
        .bucket
        .sequence_meta(sequence_id, "deleted", serde_json::Value::Null);

    *state = CommandState::DeleteSequence {
        sequence: seq,
        tracks,
        clips,
        properties,
    };
    Ok(())
}

pub(crate) fn undo_delete_sequence(
    engine: &mut Engine,
    sequence: &Sequence,
    tracks: &[Track],
    clips: &[Clip],
    properties: &[Property],
) -> Result<()> {
    sequence.save(&engine.store)?;
    for track in tracks {
        track.save(&engine.store)?;
    }
    for clip in clips {
        clip.save(&engine.store)?;
    }
    for prop in properties {
        prop.save(&engine.store)?;
    }
    engine
        .bucket
        .sequence_meta(sequence.id, "created", serde_json::Value::Null);
    Ok(())
}

pub(crate) fn add_track(
    engine: &mut Engine,
    sequence_id: Uuid,
    kind: TrackKind,
    height: Option<u32>,
    state: &mut CommandState,
) -> Result<()> {
    let seq = Sequence::load(&engine.store, sequence_id)?;
    let project = Project::load(&engine.store, seq.project_id)?;
    let index = Track::next_index(&engine.store, sequence_id, kind)?;

    let mut id_slot = match state {
        CommandState::AddTrack { track_id } => Some(*track_id),
        _ => None,
    };
    let mut track = Track::new(
        seq.id,
        kind,
        index,
        height.unwrap_or_else(|| super::project::template_height(&project, kind)),
    );
    track.id = stable_id(&mut id_slot);
    track.save(&engine.store)?;
    engine.bucket.sequence_meta(
        sequence_id,
        "track_added",
        serde_json::json!({"track_id": track.id}),
    );

    *state = CommandState::AddTrack { track_id: track.id };
    Ok(())
}

pub(crate) fn undo_add_track(engine: &mut Engine, track_id: Uuid) -> Result<()> {
    if let Some(track) = Track::load_optional(&engine.store, track_id)? {
        track.delete(&engine.store)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use ripplecut_store::Store;

    fn engine_with_project() -> (Engine, Uuid) {
        let mut engine = Engine::new(Store::open_in_memory().unwrap());
        let result = engine.execute(Command::CreateProject { name: "p".into() });
        assert!(result.success);
        let id: String = engine
            .store()
            .conn()
            .query_row("SELECT id FROM projects", [], |r| r.get(0))
            .unwrap();
        (engine, Uuid::parse_str(&id).unwrap())
    }

    fn first_sequence(engine: &Engine, project_id: Uuid) -> Sequence {
        Sequence::load_for_project(engine.store(), project_id)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_create_sequence_with_default_tracks() {
        let (mut engine, pid) = engine_with_project();
        let result = engine.execute(Command::CreateSequence {
            project_id: pid,
            name: "Main".into(),
            frame_rate: RateValue::Fps(30),
            width: 1920,
            height: 1080,
        });
        assert!(result.success);

        let seq = first_sequence(&engine, pid);
        assert_eq!(seq.frame_rate, FrameRate::FPS_30);
        let tracks = Track::load_for_sequence(engine.store(), seq.id).unwrap();
        assert_eq!(tracks.len(), 6);
        assert_eq!(
            tracks.iter().filter(|t| t.kind == TrackKind::Video).count(),
            3
        );

        assert!(engine.undo().success);
        assert!(Sequence::load_optional(engine.store(), seq.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_set_metadata_whitelist() {
        let (mut engine, pid) = engine_with_project();
        engine.execute(Command::CreateSequence {
            project_id: pid,
            name: "Main".into(),
            frame_rate: RateValue::Fps(30),
            width: 1920,
            height: 1080,
        });
        let seq = first_sequence(&engine, pid);

        let bad = engine.execute(Command::SetSequenceMetadata {
            sequence_id: seq.id,
            field: "kind".into(),
            value: serde_json::json!("master"),
        });
        assert!(!bad.success);

        let good = engine.execute(Command::SetSequenceMetadata {
            sequence_id: seq.id,
            field: "name".into(),
            value: serde_json::json!("Renamed"),
        });
        assert!(good.success);
        assert_eq!(first_sequence(&engine, pid).name, "Renamed");

        assert!(engine.undo().success);
        assert_eq!(first_sequence(&engine, pid).name, "Main");
    }

    #[test]
    fn test_mark_in_clear_sentinel() {
        let (mut engine, pid) = engine_with_project();
        engine.execute(Command::CreateSequence {
            project_id: pid,
            name: "Main".into(),
            frame_rate: RateValue::Fps(30),
            width: 1920,
            height: 1080,
        });
        let seq = first_sequence(&engine, pid);

        engine.execute(Command::SetSequenceMetadata {
            sequence_id: seq.id,
            field: "mark_in".into(),
            value: serde_json::json!(90),
        });
        assert_eq!(
            first_sequence(&engine, pid).mark_in.unwrap().frames(),
            90
        );

        engine.execute(Command::SetSequenceMetadata {
            sequence_id: seq.id,
            field: "mark_in".into(),
            value: serde_json::Value::Null,
        });
        assert!(first_sequence(&engine, pid).mark_in.is_none());

        // Undo restores the mark; one more restores the original nil.
        assert!(engine.undo().success);
        assert_eq!(first_sequence(&engine, pid).mark_in.unwrap().frames(), 90);
        assert!(engine.undo().success);
        assert!(first_sequence(&engine, pid).mark_in.is_none());
    }

    #[test]
    fn test_add_track_appends_next_index() {
        let (mut engine, pid) = engine_with_project();
        engine.execute(Command::CreateSequence {
            project_id: pid,
            name: "Main".into(),
            frame_rate: RateValue::Fps(30),
            width: 1920,
            height: 1080,
        });
        let seq = first_sequence(&engine, pid);

        assert!(engine
            .execute(Command::AddTrack {
                sequence_id: seq.id,
                kind: TrackKind::Video,
                height: None,
            })
            .success);
        let tracks = Track::load_for_sequence(engine.store(), seq.id).unwrap();
        let v4 = tracks
            .iter()
            .find(|t| t.kind == TrackKind::Video && t.index == 4)
            .unwrap();
        assert_eq!(v4.name, "V4");

        assert!(engine.undo().success);
        assert_eq!(
            Track::load_for_sequence(engine.store(), seq.id).unwrap().len(),
            6
        );
    }
}
