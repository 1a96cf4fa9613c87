//! Clip-level commands: move, delete, toggle, properties, nudge.

use std::collections::HashMap;

use tracing::{info, warn};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_model::{
    occlusion, Clip, OcclusionTarget, PendingPlacement, Property, Track,
};

use crate::bucket::ClipUpdate;
use crate::command::{CommandState, ToggleChange};
use crate::registry::Engine;
use crate::undo::MutationLedger;

use super::assign_insert_ids;

pub(crate) fn move_clip_to_track(
    engine: &mut Engine,
    clip_id: Uuid,
    track_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let clip = Clip::load(&engine.store, clip_id)?;
    let target_track = Track::load(&engine.store, track_id)?;
    let previous_track_id = clip.track_id.ok_or_else(|| {
        EngineError::ConstraintViolation(format!("clip {} is not placed on a track", clip_id))
    })?;
    if previous_track_id == track_id {
        *state = CommandState::MoveClipToTrack {
            previous_track_id,
            insert_ids: Vec::new(),
            ledger: MutationLedger::new(),
        };
        return Ok(());
    }
    let source_track = Track::load(&engine.store, previous_track_id)?;
    if source_track.kind != target_track.kind {
        return Err(EngineError::ConstraintViolation(format!(
            "cannot move a {:?} clip onto a {:?} track",
            source_track.kind, target_track.kind
        )));
    }

    let mut insert_ids = match state {
        CommandState::MoveClipToTrack { insert_ids, .. } => insert_ids.clone(),
        _ => Vec::new(),
    };

    // Clear the destination span, then land the clip there.
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
    let mut moved = clip.clone();
    moved.track_id = Some(track_id);
    ledger.update_clip(&engine.store, &mut engine.bucket, &clip, &moved)?;

    *state = CommandState::MoveClipToTrack {
        previous_track_id,
        insert_ids,
        ledger,
    };
    Ok(())
}

pub(crate) fn delete_clip(
    engine: &mut Engine,
    clip_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let clip = match Clip::load_optional(&engine.store, clip_id)? {
        Some(clip) => clip,
        None if !state.is_empty() => {
            // Replay of a delete whose clip is already gone.
            info!(%clip_id, "clip already deleted; replay degrades to success");
            return Ok(());
        }
        None => {
            return Err(EngineError::EntityNotFound(format!("clip {}", clip_id)));
        }
    };
    let properties = Property::load_for_clip(&engine.store, clip.id)?;
    clip.delete(&engine.store)?;
    engine.bucket.delete(clip.owner_sequence_id, clip.id);

    *state = CommandState::DeleteClip { clip, properties };
    Ok(())
}

pub(crate) fn undo_delete_clip(
    engine: &mut Engine,
    clip: &Clip,
    properties: &[Property],
) -> Result<()> {
    clip.save(&engine.store)?;
    for prop in properties {
        prop.save(&engine.store)?;
    }
    engine.bucket.insert(
        clip.owner_sequence_id,
        crate::bucket::ClipInsert {
            clip: clip.clone(),
            track_sequence_id: clip.owner_sequence_id,
            label: None,
        },
    );
    Ok(())
}

pub(crate) fn toggle_clip_enabled(
    engine: &mut Engine,
    sequence_id: Uuid,
    clip_ids: &[Uuid],
    state: &mut CommandState,
) -> Result<()> {
    // Replay applies the captured flips; a fresh execute computes them.
    let changes: Vec<ToggleChange> = match state {
        CommandState::ToggleClipEnabled { changes } => changes.clone(),
        _ => {
            let ids: Vec<Uuid> = if clip_ids.is_empty() {
                engine.ui.selected_clips.iter().copied().collect()
            } else {
                clip_ids.to_vec()
            };
            if ids.is_empty() {
                return Err(EngineError::MissingParameter("clip_ids".into()));
            }
            let mut changes = Vec::with_capacity(ids.len());
            for id in ids {
                let clip = Clip::load(&engine.store, id)?;
                changes.push(ToggleChange {
                    clip_id: id,
                    enabled_before: clip.enabled,
                    enabled_after: !clip.enabled,
                });
            }
            changes
        }
    };

    apply_toggle_target(engine, sequence_id, &changes, true)?;
    *state = CommandState::ToggleClipEnabled { changes };
    Ok(())
}

/// Apply the `after` (redo) or `before` (undo) side of captured flips.
pub(crate) fn apply_toggle_changes(
    engine: &mut Engine,
    changes: &[ToggleChange],
    forward: bool,
) -> Result<()> {
    let sequence_id = changes
        .first()
        .map(|c| c.clip_id)
        .and_then(|id| Clip::load_optional(&engine.store, id).ok().flatten())
        .map(|c| c.owner_sequence_id);
    match sequence_id {
        Some(seq) => apply_toggle_target(engine, seq, changes, forward),
        None => Ok(()),
    }
}

fn apply_toggle_target(
    engine: &mut Engine,
    _sequence_id: Uuid,
    changes: &[ToggleChange],
    forward: bool,
) -> Result<()> {
    for change in changes {
        let mut clip = match Clip::load_optional(&engine.store, change.clip_id)? {
            Some(clip) => clip,
            None => {
                warn!(clip = %change.clip_id, "toggled clip vanished; skipping");
                continue;
            }
        };
        clip.enabled = if forward {
            change.enabled_after
        } else {
            change.enabled_before
        };
        clip.save(&engine.store)?;
        engine
            .bucket
            .update(clip.owner_sequence_id, ClipUpdate::from_clip(&clip));
    }
    Ok(())
}

pub(crate) fn set_clip_property(
    engine: &mut Engine,
    clip_id: Uuid,
    property_name: &str,
    value: serde_json::Value,
    property_type: Option<&str>,
    default_value: Option<serde_json::Value>,
    state: &mut CommandState,
) -> Result<()> {
    if property_name.trim().is_empty() {
        return Err(EngineError::MissingParameter("property_name".into()));
    }
    if Clip::load_optional(&engine.store, clip_id)?.is_none() {
        if !state.is_empty() {
            // The clip disappeared between execute and replay.
            info!(%clip_id, "property target vanished; replay degrades to success");
            if let CommandState::SetClipProperty { degraded, .. } = state {
                *degraded = true;
            }
            return Ok(());
        }
        return Err(EngineError::EntityNotFound(format!("clip {}", clip_id)));
    }

    let previous = Property::get(&engine.store, clip_id, property_name)?;
    let inferred_type = property_type.unwrap_or(match &value {
        serde_json::Value::Number(_) => "NUMBER",
        serde_json::Value::Bool(_) => "BOOL",
        _ => "STRING",
    });
    let wrapped = serde_json::json!({ "value": value });
    let wrapped_default = default_value.map(|d| serde_json::json!({ "value": d }));
    let row = Property::upsert(
        &engine.store,
        clip_id,
        property_name,
        &wrapped,
        inferred_type,
        wrapped_default.as_ref(),
    )?;

    *state = CommandState::SetClipProperty {
        created_property_id: previous.is_none().then_some(row.id),
        previous,
        degraded: false,
    };
    Ok(())
}

pub(crate) fn undo_set_clip_property(
    engine: &mut Engine,
    clip_id: Uuid,
    property_name: &str,
    previous: Option<&Property>,
    created_property_id: Option<Uuid>,
    degraded: bool,
) -> Result<()> {
    if degraded {
        return Ok(());
    }
    match previous {
        Some(prop) => prop.save(&engine.store),
        None => {
            if created_property_id.is_some() {
                if let Some(row) = Property::get(&engine.store, clip_id, property_name)? {
                    row.delete(&engine.store)?;
                }
            }
            Ok(())
        }
    }
}

/// Move the selected clips by `delta_frames`, clamped so no clip crosses
/// the timeline origin or lands on a non-selected neighbour.
pub(crate) fn nudge(
    engine: &mut Engine,
    sequence_id: Uuid,
    delta_frames: i64,
    clip_ids: &[Uuid],
    state: &mut CommandState,
) -> Result<()> {
    let seq = super::load_sequence(engine, sequence_id)?;
    let rate = seq.frame_rate;
    let ids: Vec<Uuid> = if clip_ids.is_empty() {
        engine.ui.selected_clips.iter().copied().collect()
    } else {
        clip_ids.to_vec()
    };
    if ids.is_empty() {
        return Err(EngineError::MissingParameter("clip_ids".into()));
    }

    let all = super::sequence_clips(engine, sequence_id)?;
    let moving: Vec<Clip> = all.iter().filter(|c| ids.contains(&c.id)).cloned().collect();
    if moving.is_empty() {
        return Err(EngineError::EntityNotFound("selected clips".into()));
    }

    // Clamp the delta against static neighbours; the selection moves as
    // one block.
    let mut delta = delta_frames;
    for clip in &moving {
        let start = clip.timeline_start.rescale(rate).frames();
        let end = start + clip.duration.rescale(rate).frames();
        delta = delta.max(-start);
        for other in &all {
            if ids.contains(&other.id) || other.track_id != clip.track_id {
                continue;
            }
            let o_start = other.timeline_start.rescale(rate).frames();
            let o_end = o_start + other.duration.rescale(rate).frames();
            if o_end <= start {
                delta = delta.max(o_end - start);
            }
            if o_start >= end {
                delta = delta.min(o_start - end);
            }
        }
    }
    if delta == 0 {
        *state = CommandState::Nudge {
            ledger: MutationLedger::new(),
        };
        return Ok(());
    }

    let mut ledger = MutationLedger::new();
    let mut ordered = moving;
    if delta > 0 {
        ordered.sort_by_key(|c| std::cmp::Reverse(c.timeline_start.frames()));
    } else {
        ordered.sort_by_key(|c| c.timeline_start.frames());
    }
    for clip in &ordered {
        let mut after = clip.clone();
        after.timeline_start = ripplecut_core::RationalTime::from_frames(
            clip.timeline_start.rescale(rate).frames() + delta,
            rate,
        )
        .rescale(clip.frame_rate);
        ledger.update_clip(&engine.store, &mut engine.bucket, clip, &after)?;
    }

    *state = CommandState::Nudge { ledger };
    Ok(())
}

/// Pending-placement overlay for a set of clips about to shift together.
pub(crate) fn pending_shift(
    clips: &[Clip],
    shift: ripplecut_core::RationalTime,
) -> HashMap<Uuid, PendingPlacement> {
    clips
        .iter()
        .map(|c| {
            (
                c.id,
                PendingPlacement {
                    start: c.timeline_start + shift,
                    duration: c.duration,
                    tolerance: 0,
                },
            )
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::Command;
    use ripplecut_core::{FrameRate, RationalTime};
    use ripplecut_model::{Project, Sequence, TrackKind};
    use ripplecut_store::Store;

    pub(crate) fn fixture() -> (Engine, Uuid, Uuid, Uuid) {
        let mut engine = Engine::new(Store::open_in_memory().unwrap());
        let p = Project::new("p");
        p.save(engine.store()).unwrap();
        let s = Sequence::new(p.id, "s", FrameRate::FPS_30, 1920, 1080);
        s.save(engine.store()).unwrap();
        let t = Track::new(s.id, TrackKind::Video, 1, 48);
        t.save(engine.store()).unwrap();
        (engine, p.id, s.id, t.id)
    }

    pub(crate) fn place(engine: &Engine, pid: Uuid, sid: Uuid, tid: Uuid, start: i64, dur: i64) -> Clip {
        let rate = FrameRate::FPS_30;
        let clip = Clip::new_timeline(
            pid,
            sid,
            tid,
            format!("c{}", start),
            rate,
            RationalTime::from_frames(start, rate),
            RationalTime::from_frames(dur, rate),
            RationalTime::zero(rate),
        );
        clip.save(engine.store()).unwrap();
        clip
    }

    #[test]
    fn test_delete_clip_roundtrip() {
        let (mut engine, pid, sid, tid) = fixture();
        let clip = place(&engine, pid, sid, tid, 0, 100);
        Property::upsert(
            engine.store(),
            clip.id,
            "opacity",
            &serde_json::json!({"value": 0.5}),
            "NUMBER",
            None,
        )
        .unwrap();

        assert!(engine.execute(Command::DeleteClip { clip_id: clip.id }).success);
        assert!(Clip::load_optional(engine.store(), clip.id).unwrap().is_none());

        assert!(engine.undo().success);
        assert_eq!(Clip::load(engine.store(), clip.id).unwrap(), clip);
        assert!(Property::get(engine.store(), clip.id, "opacity")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_toggle_undo_redo() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 50);
        let b = place(&engine, pid, sid, tid, 100, 50);

        assert!(engine
            .execute(Command::ToggleClipEnabled {
                sequence_id: sid,
                clip_ids: vec![a.id, b.id],
            })
            .success);
        assert!(!Clip::load(engine.store(), a.id).unwrap().enabled);
        assert!(!Clip::load(engine.store(), b.id).unwrap().enabled);

        assert!(engine.undo().success);
        assert!(Clip::load(engine.store(), a.id).unwrap().enabled);

        assert!(engine.redo().success);
        assert!(!Clip::load(engine.store(), a.id).unwrap().enabled);
        assert!(!Clip::load(engine.store(), b.id).unwrap().enabled);
    }

    #[test]
    fn test_set_property_creates_then_restores() {
        let (mut engine, pid, sid, tid) = fixture();
        let clip = place(&engine, pid, sid, tid, 0, 50);

        assert!(engine
            .execute(Command::SetClipProperty {
                clip_id: clip.id,
                property_name: "opacity".into(),
                value: serde_json::json!(0.8),
                property_type: None,
                default_value: None,
            })
            .success);
        let row = Property::get(engine.store(), clip.id, "opacity")
            .unwrap()
            .unwrap();
        assert_eq!(row.value, serde_json::json!({"value": 0.8}));
        assert_eq!(row.property_type, "NUMBER");

        // Second write captures the first as previous.
        assert!(engine
            .execute(Command::SetClipProperty {
                clip_id: clip.id,
                property_name: "opacity".into(),
                value: serde_json::json!(0.3),
                property_type: None,
                default_value: None,
            })
            .success);

        assert!(engine.undo().success);
        let row = Property::get(engine.store(), clip.id, "opacity")
            .unwrap()
            .unwrap();
        assert_eq!(row.value, serde_json::json!({"value": 0.8}));

        // Undoing the creating write removes the row entirely.
        assert!(engine.undo().success);
        assert!(Property::get(engine.store(), clip.id, "opacity")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_move_clip_to_track_resolves_occlusion() {
        let (mut engine, pid, sid, tid) = fixture();
        let v2 = Track::new(sid, TrackKind::Video, 2, 48);
        v2.save(engine.store()).unwrap();

        let mover = place(&engine, pid, sid, tid, 50, 100);
        let blocker = place(&engine, pid, sid, v2.id, 100, 100);

        assert!(engine
            .execute(Command::MoveClipToTrack {
                clip_id: mover.id,
                track_id: v2.id,
            })
            .success);

        let moved = Clip::load(engine.store(), mover.id).unwrap();
        assert_eq!(moved.track_id, Some(v2.id));
        // The blocker lost its head up to the mover's end at 150.
        let trimmed = Clip::load(engine.store(), blocker.id).unwrap();
        assert_eq!(trimmed.timeline_start.frames(), 150);
        assert_eq!(trimmed.duration.frames(), 50);

        assert!(engine.undo().success);
        assert_eq!(Clip::load(engine.store(), mover.id).unwrap(), mover);
        assert_eq!(Clip::load(engine.store(), blocker.id).unwrap(), blocker);
    }

    #[test]
    fn test_move_rejects_kind_mismatch() {
        let (mut engine, pid, sid, tid) = fixture();
        let audio = Track::new(sid, TrackKind::Audio, 1, 24);
        audio.save(engine.store()).unwrap();
        let clip = place(&engine, pid, sid, tid, 0, 50);

        assert!(!engine
            .execute(Command::MoveClipToTrack {
                clip_id: clip.id,
                track_id: audio.id,
            })
            .success);
    }

    #[test]
    fn test_nudge_clamps_against_neighbour() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 50);
        let b = place(&engine, pid, sid, tid, 60, 50);

        // Nudging A right by 30 would overlap B; only the 10-frame gap is
        // available.
        assert!(engine
            .execute(Command::Nudge {
                sequence_id: sid,
                delta_frames: 30,
                clip_ids: vec![a.id],
            })
            .success);
        assert_eq!(
            Clip::load(engine.store(), a.id).unwrap().timeline_start.frames(),
            10
        );
        assert_eq!(
            Clip::load(engine.store(), b.id).unwrap().timeline_start.frames(),
            60
        );

        assert!(engine.undo().success);
        assert_eq!(
            Clip::load(engine.store(), a.id).unwrap().timeline_start.frames(),
            0
        );
    }

    #[test]
    fn test_nudge_block_moves_together() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 50);
        let b = place(&engine, pid, sid, tid, 50, 50);

        // Both selected: they move as a block, limited by the origin.
        assert!(engine
            .execute(Command::Nudge {
                sequence_id: sid,
                delta_frames: -20,
                clip_ids: vec![a.id, b.id],
            })
            .success);
        assert_eq!(
            Clip::load(engine.store(), a.id).unwrap().timeline_start.frames(),
            0
        );
        assert_eq!(
            Clip::load(engine.store(), b.id).unwrap().timeline_start.frames(),
            50
        );
    }
}
