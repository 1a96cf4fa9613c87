//! Structural commands: CreateClip, Insert, Overwrite, SplitClip, Split,
//! RippleDelete, RippleDeleteSelection.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result, TimeValue};
use ripplecut_model::{
    occlusion, Clip, ClipKind, Media, OcclusionTarget, Property, Sequence, SequenceKind,
};

use crate::command::CommandState;
use crate::registry::Engine;
use crate::undo::MutationLedger;

use super::{assign_insert_ids, load_sequence, sequence_clips, stable_id};

/// Where a new timeline clip's content comes from: an imported media row
/// or a master clip (masterclip sequence).
struct SourceSpec {
    name: String,
    media_id: Option<Uuid>,
    source_sequence_id: Option<Uuid>,
    parent_clip_id: Option<Uuid>,
    properties_from: Option<Uuid>,
    duration: RationalTime,
    source_in: RationalTime,
}

fn resolve_source(
    engine: &Engine,
    rate: FrameRate,
    media_id: Option<Uuid>,
    master_clip_id: Option<Uuid>,
    duration: Option<TimeValue>,
    source_in: Option<TimeValue>,
) -> Result<SourceSpec> {
    let source_in = source_in
        .map(|t| t.hydrate(rate))
        .unwrap_or_else(|| RationalTime::zero(rate));

    if let Some(master_id) = master_clip_id {
        let master = Sequence::load(&engine.store, master_id)?;
        if master.kind != SequenceKind::Masterclip {
            return Err(EngineError::ConstraintViolation(format!(
                "sequence {} is not a master clip",
                master_id
            )));
        }
        let streams: Vec<Clip> = Clip::load_for_sequence(&engine.store, master_id)?
            .into_iter()
            .filter(|c| c.clip_kind == ClipKind::MasterclipStream)
            .collect();
        // Prefer the video stream; audio-only masters fall back to their
        // first stream.
        let mut stream = streams.first().cloned().ok_or_else(|| {
            EngineError::EntityNotFound(format!("stream clips of master {}", master_id))
        })?;
        for candidate in &streams {
            let on_video = candidate
                .track_id
                .map(|t| {
                    ripplecut_model::Track::load_optional(&engine.store, t)
                        .ok()
                        .flatten()
                        .map(|track| track.kind == ripplecut_model::TrackKind::Video)
                        .unwrap_or(false)
                })
                .unwrap_or(false);
            if on_video {
                stream = candidate.clone();
                break;
            }
        }
        let stream = &stream;
        let duration = duration
            .map(|t| t.hydrate(rate))
            .unwrap_or_else(|| stream.duration.rescale(rate) - source_in);
        return Ok(SourceSpec {
            name: master.name.clone(),
            media_id: stream.media_id,
            source_sequence_id: Some(master_id),
            parent_clip_id: Some(stream.id),
            properties_from: Some(stream.id),
            duration,
            source_in,
        });
    }

    if let Some(media_id) = media_id {
        let media = Media::load(&engine.store, media_id)?;
        let duration = duration
            .map(|t| t.hydrate(rate))
            .unwrap_or_else(|| media.duration.rescale(rate) - source_in);
        let name = std::path::Path::new(&media.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| media.path.clone());
        return Ok(SourceSpec {
            name,
            media_id: Some(media.id),
            source_sequence_id: None,
            parent_clip_id: None,
            properties_from: None,
            duration,
            source_in,
        });
    }

    Err(EngineError::MissingParameter(
        "media_id or master_clip_id".into(),
    ))
}

fn build_clip(
    seq: &Sequence,
    track_id: Uuid,
    source: &SourceSpec,
    id: Uuid,
    start: RationalTime,
) -> Result<Clip> {
    let mut clip = Clip::new_timeline(
        seq.project_id,
        seq.id,
        track_id,
        source.name.clone(),
        seq.frame_rate,
        start,
        source.duration,
        source.source_in,
    );
    clip.id = id;
    clip.media_id = source.media_id;
    clip.source_sequence_id = source.source_sequence_id;
    clip.parent_clip_id = source.parent_clip_id;
    clip.validate()?;
    Ok(clip)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create_clip(
    engine: &mut Engine,
    sequence_id: Uuid,
    track_id: Uuid,
    media_id: Option<Uuid>,
    master_clip_id: Option<Uuid>,
    timeline_start: TimeValue,
    duration: Option<TimeValue>,
    source_in: Option<TimeValue>,
    state: &mut CommandState,
) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let source = resolve_source(engine, rate, media_id, master_clip_id, duration, source_in)?;
    let start = timeline_start.hydrate(rate);

    let (mut id_slot, mut insert_ids) = match state {
        CommandState::CreateClip {
            clip_id, insert_ids, ..
        } => (Some(*clip_id), insert_ids.clone()),
        _ => (None, Vec::new()),
    };
    let clip_id = stable_id(&mut id_slot);
    let clip = build_clip(&seq, track_id, &source, clip_id, start)?;

    let track_clips = Clip::load_for_track(&engine.store, track_id)?;
    let mut actions = occlusion::resolve(
        &track_clips,
        &OcclusionTarget {
            track_id,
            timeline_start: clip.timeline_start,
            duration: clip.duration,
            exclude_clip_id: Some(clip.id),
        },
        &HashMap::new(),
    );
    assign_insert_ids(&mut actions, &mut insert_ids);

    let mut ledger = MutationLedger::new();
    for action in &actions {
        ledger.apply_occlusion_action(&engine.store, &mut engine.bucket, action)?;
    }
    ledger.insert_clip(&engine.store, &mut engine.bucket, &clip, source.properties_from)?;

    *state = CommandState::CreateClip {
        clip_id,
        insert_ids,
        ledger,
    };
    Ok(())
}

/// Insert ripples on the target track only: every clip at or past the
/// insert point shifts right by the new clip's duration (seen atomically
/// by the occlusion resolver through a pending overlay), then the new
/// clip lands at the insert point. A clip straddling the insert point is
/// trimmed by the resolver.
#[allow(clippy::too_many_arguments)]
pub(crate) fn insert(
    engine: &mut Engine,
    sequence_id: Uuid,
    track_id: Uuid,
    media_id: Option<Uuid>,
    master_clip_id: Option<Uuid>,
    insert_time: TimeValue,
    duration: Option<TimeValue>,
    source_in: Option<TimeValue>,
    advance_playhead: bool,
    state: &mut CommandState,
) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let source = resolve_source(engine, rate, media_id, master_clip_id, duration, source_in)?;
    let at = insert_time.hydrate(rate);
    let dur = source.duration;

    let (mut id_slot, mut insert_ids) = match state {
        CommandState::Insert {
            clip_id, insert_ids, ..
        } => (Some(*clip_id), insert_ids.clone()),
        _ => (None, Vec::new()),
    };
    let clip_id = stable_id(&mut id_slot);
    let clip = build_clip(&seq, track_id, &source, clip_id, at)?;

    let track_clips = Clip::load_for_track(&engine.store, track_id)?;
    let shifted: Vec<Clip> = track_clips
        .iter()
        .filter(|c| c.timeline_start >= at)
        .cloned()
        .collect();
    let pending = super::clip::pending_shift(&shifted, dur);

    let mut actions = occlusion::resolve(
        &track_clips,
        &OcclusionTarget {
            track_id,
            timeline_start: at,
            duration: dur,
            exclude_clip_id: Some(clip.id),
        },
        &pending,
    );
    assign_insert_ids(&mut actions, &mut insert_ids);

    let mut ledger = MutationLedger::new();
    // Rightmost first so the shift never makes two rows swap order.
    let mut by_start = shifted;
    by_start.sort_by_key(|c| std::cmp::Reverse(c.timeline_start.frames()));
    for before in &by_start {
        let mut after = before.clone();
        after.timeline_start = before.timeline_start + dur.rescale(before.frame_rate);
        ledger.update_clip(&engine.store, &mut engine.bucket, before, &after)?;
    }
    for action in &actions {
        ledger.apply_occlusion_action(&engine.store, &mut engine.bucket, action)?;
    }
    ledger.insert_clip(&engine.store, &mut engine.bucket, &clip, source.properties_from)?;

    if advance_playhead {
        engine.ui.set_playhead(sequence_id, at + dur);
        engine.bucket.sequence_meta(
            sequence_id,
            "playhead",
            serde_json::json!({"frames": (at + dur).frames()}),
        );
    }

    *state = CommandState::Insert {
        clip_id,
        insert_ids,
        ledger,
    };
    Ok(())
}

/// Overwrite resolves occlusions over the target span, then lands the
/// new clip. Nothing downstream moves.
#[allow(clippy::too_many_arguments)]
pub(crate) fn overwrite(
    engine: &mut Engine,
    sequence_id: Uuid,
    track_id: Uuid,
    media_id: Option<Uuid>,
    master_clip_id: Option<Uuid>,
    overwrite_time: TimeValue,
    duration: Option<TimeValue>,
    source_in: Option<TimeValue>,
    advance_playhead: bool,
    state: &mut CommandState,
) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let source = resolve_source(engine, rate, media_id, master_clip_id, duration, source_in)?;
    let at = overwrite_time.hydrate(rate);

    let (mut id_slot, mut insert_ids) = match state {
        CommandState::Overwrite {
            clip_id, insert_ids, ..
        } => (Some(*clip_id), insert_ids.clone()),
        _ => (None, Vec::new()),
    };
    let clip_id = stable_id(&mut id_slot);
    let clip = build_clip(&seq, track_id, &source, clip_id, at)?;

    let track_clips = Clip::load_for_track(&engine.store, track_id)?;
    let mut actions = occlusion::resolve(
        &track_clips,
        &OcclusionTarget {
            track_id,
            timeline_start: clip.timeline_start,
            duration: clip.duration,
            exclude_clip_id: Some(clip.id),
        },
        &HashMap::new(),
    );
    assign_insert_ids(&mut actions, &mut insert_ids);

    let mut ledger = MutationLedger::new();
    for action in &actions {
        ledger.apply_occlusion_action(&engine.store, &mut engine.bucket, action)?;
    }
    ledger.insert_clip(&engine.store, &mut engine.bucket, &clip, source.properties_from)?;

    if advance_playhead {
        let end = at + clip.duration;
        engine.ui.set_playhead(sequence_id, end);
        engine.bucket.sequence_meta(
            sequence_id,
            "playhead",
            serde_json::json!({"frames": end.frames()}),
        );
    }

    *state = CommandState::Overwrite {
        clip_id,
        insert_ids,
        ledger,
    };
    Ok(())
}

/// Split one clip at an absolute sequence time. The second clip's id is
/// persisted so replay recreates it exactly.
pub(crate) fn split_clip(
    engine: &mut Engine,
    clip_id: Uuid,
    split_value: TimeValue,
    state: &mut CommandState,
) -> Result<()> {
    let clip = Clip::load(&engine.store, clip_id)?;
    let seq = Sequence::load(&engine.store, clip.owner_sequence_id)?;
    let rate = seq.frame_rate;
    let split = split_value.hydrate(rate);

    let start = clip.timeline_start.rescale(rate);
    let end = start + clip.duration.rescale(rate);
    if split <= start || split >= end {
        return Err(EngineError::ConstraintViolation(format!(
            "split point {} is outside clip ({}..{})",
            split.frames(),
            start.frames(),
            end.frames()
        )));
    }

    let mut second_slot = match state {
        CommandState::SplitClip { second_clip_id, .. } => Some(*second_clip_id),
        _ => None,
    };
    let second_clip_id = stable_id(&mut second_slot);

    let first_duration = split - start;
    let original = clip.snapshot();

    let mut second = clip.clone();
    second.id = second_clip_id;
    second.timeline_start = split.rescale(clip.frame_rate);
    second.duration = (clip.duration.rescale(rate) - first_duration).rescale(clip.frame_rate);
    second.source_in = clip.source_in + first_duration.rescale(clip.frame_rate);
    second.source_out = second.source_in + second.duration;

    let mut first = clip;
    first.duration = first_duration.rescale(first.frame_rate);
    first.source_out = first.source_in + first.duration;

    first.validate()?;
    second.validate()?;
    first.save(&engine.store)?;
    second.save(&engine.store)?;
    Property::copy_all(&engine.store, first.id, second.id)?;

    engine
        .bucket
        .update(first.owner_sequence_id, crate::bucket::ClipUpdate::from_clip(&first));
    engine.bucket.insert(
        second.owner_sequence_id,
        crate::bucket::ClipInsert {
            clip: second.clone(),
            track_sequence_id: second.owner_sequence_id,
            label: None,
        },
    );
    info!(clip = %first.id, second = %second.id, at = split.frames(), "split clip");

    *state = CommandState::SplitClip {
        second_clip_id,
        original,
    };
    Ok(())
}

pub(crate) fn undo_split_clip(
    engine: &mut Engine,
    second_clip_id: Uuid,
    original: &Clip,
) -> Result<()> {
    if let Some(second) = Clip::load_optional(&engine.store, second_clip_id)? {
        second.delete(&engine.store)?;
        engine.bucket.delete(second.owner_sequence_id, second.id);
    }
    original.save(&engine.store)?;
    engine.bucket.update(
        original.owner_sequence_id,
        crate::bucket::ClipUpdate::from_clip(original),
    );
    Ok(())
}

/// Interactive split: razor every clip under the playhead (or an explicit
/// time), one nested SplitClip per clip, all in one undo group.
pub(crate) fn split(
    engine: &mut Engine,
    sequence_id: Uuid,
    at: Option<TimeValue>,
    state: &mut CommandState,
) -> Result<()> {
    if matches!(state, CommandState::Split { .. }) {
        // The nested SplitClip records replay themselves from the log.
        return Ok(());
    }
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let split_at = at
        .map(|t| t.hydrate(rate))
        .or_else(|| engine.ui.playhead(sequence_id))
        .unwrap_or(seq.playhead)
        .rescale(rate);

    let clips = sequence_clips(engine, sequence_id)?;
    let selection = &engine.ui.selected_clips;
    let targets: Vec<Uuid> = clips
        .iter()
        .filter(|c| {
            let start = c.timeline_start.rescale(rate);
            let end = start + c.duration.rescale(rate);
            start < split_at && split_at < end
        })
        .filter(|c| selection.is_empty() || selection.contains(&c.id))
        .map(|c| c.id)
        .collect();

    for clip_id in &targets {
        engine.execute_nested(crate::command::Command::SplitClip {
            clip_id: *clip_id,
            split_value: TimeValue::Frames(split_at.frames()),
        })?;
    }

    *state = CommandState::Split {
        split_frames: split_at.frames(),
        clip_ids: targets,
    };
    Ok(())
}

/// Gap-form ripple delete: verify the gap is clear on every track of the
/// sequence, then close it by shifting all later clips left.
pub(crate) fn ripple_delete(
    engine: &mut Engine,
    sequence_id: Uuid,
    track_id: Uuid,
    gap_start: TimeValue,
    gap_duration: TimeValue,
    state: &mut CommandState,
) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let start = gap_start.hydrate(rate);
    let duration = gap_duration.hydrate(rate);
    if duration.frames() <= 0 {
        return Err(EngineError::ConstraintViolation(
            "gap duration must be positive".into(),
        ));
    }
    let end = start + duration;

    let clips = Clip::load_for_sequence(&engine.store, sequence_id)?;
    for clip in &clips {
        let c_start = clip.timeline_start.rescale(rate);
        let c_end = c_start + clip.duration.rescale(rate);
        if c_start < end && start < c_end {
            return Err(EngineError::ConstraintViolation(format!(
                "gap {}..{} is occluded by clip {}",
                start.frames(),
                end.frames(),
                clip.id
            )));
        }
    }

    let mut ledger = MutationLedger::new();
    let mut movers: Vec<&Clip> = clips
        .iter()
        .filter(|c| c.timeline_start.rescale(rate) >= end)
        .collect();
    movers.sort_by_key(|c| c.timeline_start.frames());
    for before in movers {
        let mut after = before.clone();
        let new_start =
            (before.timeline_start.rescale(rate) - duration).frames().max(0);
        after.timeline_start =
            RationalTime::from_frames(new_start, rate).rescale(before.frame_rate);
        ledger.update_clip(&engine.store, &mut engine.bucket, before, &after)?;
    }
    let _ = track_id; // The gap is addressed per-track; the close is global.

    *state = CommandState::RippleDelete {
        gap_start: start.frames(),
        gap_duration: duration.frames(),
        ledger,
    };
    Ok(())
}

/// Delete the selected clips and close the holes per track (or collapse
/// the cross-track union window in block mode).
pub(crate) fn ripple_delete_selection(
    engine: &mut Engine,
    sequence_id: Uuid,
    clip_ids: &[Uuid],
    block_mode: bool,
    state: &mut CommandState,
) -> Result<()> {
    let seq = load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let ids: Vec<Uuid> = if clip_ids.is_empty() {
        engine.ui.selected_clips.iter().copied().collect()
    } else {
        clip_ids.to_vec()
    };
    if ids.is_empty() {
        return Err(EngineError::MissingParameter("clip_ids".into()));
    }

    let clips = Clip::load_for_sequence(&engine.store, sequence_id)?;
    let doomed: Vec<Clip> = clips.iter().filter(|c| ids.contains(&c.id)).cloned().collect();
    if doomed.is_empty() {
        return Err(EngineError::EntityNotFound("selected clips".into()));
    }

    let mut ledger = MutationLedger::new();
    for clip in &doomed {
        ledger.delete_clip(&engine.store, &mut engine.bucket, clip)?;
    }

    if block_mode {
        // Collapse the union window across every track.
        let win_start = doomed
            .iter()
            .map(|c| c.timeline_start.rescale(rate).frames())
            .min()
            .unwrap_or(0);
        let win_end = doomed
            .iter()
            .map(|c| (c.timeline_start.rescale(rate) + c.duration.rescale(rate)).frames())
            .max()
            .unwrap_or(0);
        let shift = win_end - win_start;
        let mut movers: Vec<&Clip> = clips
            .iter()
            .filter(|c| !ids.contains(&c.id))
            .filter(|c| c.timeline_start.rescale(rate).frames() >= win_end)
            .collect();
        movers.sort_by_key(|c| c.timeline_start.frames());
        for before in movers {
            let mut after = before.clone();
            after.timeline_start = RationalTime::from_frames(
                before.timeline_start.rescale(rate).frames() - shift,
                rate,
            )
            .rescale(before.frame_rate);
            ledger.update_clip(&engine.store, &mut engine.bucket, before, &after)?;
        }
    } else {
        // Per track: each survivor moves left by the total duration of
        // the deleted clips that started before it.
        let mut survivors: Vec<&Clip> = clips
            .iter()
            .filter(|c| !ids.contains(&c.id))
            .collect();
        survivors.sort_by_key(|c| c.timeline_start.frames());
        for before in survivors {
            let removed_ahead: i64 = doomed
                .iter()
                .filter(|d| d.track_id == before.track_id)
                .filter(|d| d.timeline_start < before.timeline_start)
                .map(|d| d.duration.rescale(rate).frames())
                .sum();
            if removed_ahead == 0 {
                continue;
            }
            let mut after = before.clone();
            after.timeline_start = RationalTime::from_frames(
                (before.timeline_start.rescale(rate).frames() - removed_ahead).max(0),
                rate,
            )
            .rescale(before.frame_rate);
            ledger.update_clip(&engine.store, &mut engine.bucket, before, &after)?;
        }
    }

    engine.ui.clear_edit_selection();
    *state = CommandState::RippleDeleteSelection { ledger };
    Ok(())
}
