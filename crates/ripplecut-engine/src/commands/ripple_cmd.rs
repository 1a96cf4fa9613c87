//! Ripple commands: BatchRippleEdit, RippleEdit, ExtendEdit.
//!
//! The single-edge trim is the batch pipeline with one edge; ExtendEdit
//! derives its delta from the playhead and delegates. Execution applies
//! the plan through the mutation ledger so undo rehydrates the reverse
//! stream from the executed-mutation order.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use ripplecut_core::{EngineError, RationalTime, Result};
use ripplecut_model::{Clip, Media, Sequence};

use crate::command::CommandState;
use crate::registry::Engine;
use crate::ripple::batch::{plan, BatchPlanInput};
use crate::ripple::{EdgeSelector, EdgeType, RipplePreview};
use crate::undo::MutationLedger;

use super::sequence_clips;

pub(crate) fn batch_ripple_edit(
    engine: &mut Engine,
    sequence_id: Uuid,
    edges: &[EdgeSelector],
    delta_frames: Option<i64>,
    delta_ms: Option<f64>,
    dry_run: bool,
    state: &mut CommandState,
) -> Result<Option<RipplePreview>> {
    if edges.is_empty() {
        return Err(EngineError::MissingParameter("edges".into()));
    }
    let seq = Sequence::load(&engine.store, sequence_id)?;
    let rate = seq.frame_rate;

    // Frames are authoritative; milliseconds are converted at the
    // sequence rate. Replay re-runs with the persisted clamped delta.
    let delta_req = match state {
        CommandState::Ripple {
            clamped_delta_frames,
            ..
        } => *clamped_delta_frames,
        _ => match (delta_frames, delta_ms) {
            (Some(frames), _) => frames,
            (None, Some(ms)) => RationalTime::from_ms(ms, rate).frames(),
            (None, None) => {
                return Err(EngineError::MissingParameter(
                    "delta_frames or delta_ms".into(),
                ))
            }
        },
    };

    let clips = sequence_clips(engine, sequence_id)?;
    let media_lengths = edge_media_lengths(engine, &clips, edges, rate)?;

    let ripple_plan = plan(&BatchPlanInput {
        rate,
        clips: &clips,
        edges,
        delta_frames: delta_req,
        media_lengths: &media_lengths,
    })?;
    let preview = ripple_plan.preview.clone();

    if dry_run {
        // No store writes, no bucket entries; the caller renders the plan.
        return Ok(Some(preview));
    }

    let mut ledger = MutationLedger::new();
    if !ripple_plan.is_noop() {
        for block in ripple_plan.bulk_shifts.iter().filter(|b| b.shift_frames > 0) {
            ledger.bulk_shift(&engine.store, &mut engine.bucket, sequence_id, block.clone())?;
        }
        for clip_id in &ripple_plan.deletes {
            let clip = Clip::load(&engine.store, *clip_id)?;
            ledger.delete_clip(&engine.store, &mut engine.bucket, &clip)?;
        }
        for update in &ripple_plan.updates {
            let before = Clip::load(&engine.store, update.clip_id)?;
            let mut after = before.clone();
            let clip_rate = before.frame_rate;
            after.track_id = Some(update.track_id);
            after.timeline_start =
                RationalTime::from_frames(update.start, rate).rescale(clip_rate);
            after.duration = RationalTime::from_frames(update.duration, rate).rescale(clip_rate);
            after.source_in =
                RationalTime::from_frames(update.source_in, rate).rescale(clip_rate);
            after.source_out = after.source_in + after.duration;
            after.validate()?;
            ledger.update_clip(&engine.store, &mut engine.bucket, &before, &after)?;
        }
        for block in ripple_plan.bulk_shifts.iter().filter(|b| b.shift_frames < 0) {
            ledger.bulk_shift(&engine.store, &mut engine.bucket, sequence_id, block.clone())?;
        }
    } else {
        debug!("ripple resolved to a no-op");
    }

    *state = CommandState::Ripple {
        clamped_delta_frames: ripple_plan.clamped_delta,
        clamped_delta_ms: preview.clamped_delta_ms,
        ledger,
    };
    Ok(Some(preview))
}

/// Media boundaries for the edited clips, in sequence-rate frames.
fn edge_media_lengths(
    engine: &Engine,
    clips: &[Clip],
    edges: &[EdgeSelector],
    rate: ripplecut_core::FrameRate,
) -> Result<HashMap<Uuid, i64>> {
    let mut lengths = HashMap::new();
    for edge in edges {
        let Some(clip) = clips.iter().find(|c| c.id == edge.clip_id) else {
            continue;
        };
        let Some(media_id) = clip.media_id else {
            continue;
        };
        if let Some(media) = Media::load_optional(&engine.store, media_id)? {
            lengths.insert(clip.id, media.duration.rescale(rate).frames());
        }
    }
    Ok(lengths)
}

/// Extend the lead edge to the playhead: the delta is the distance from
/// the edge position, and the full constraint, clamp, and undo machinery
/// comes from the batch pipeline.
pub(crate) fn extend_edit(
    engine: &mut Engine,
    sequence_id: Uuid,
    edges: &[EdgeSelector],
    state: &mut CommandState,
) -> Result<Option<RipplePreview>> {
    if edges.is_empty() {
        return Err(EngineError::MissingParameter("edges".into()));
    }
    let seq = Sequence::load(&engine.store, sequence_id)?;
    let rate = seq.frame_rate;
    let lead = edges.iter().find(|e| e.lead).unwrap_or(&edges[0]);

    let clip = Clip::load(&engine.store, lead.clip_id)?;
    let start = clip.timeline_start.rescale(rate);
    let end = start + clip.duration.rescale(rate);
    let edge_position = match lead.edge_type {
        EdgeType::In | EdgeType::GapBefore => start,
        EdgeType::Out | EdgeType::GapAfter => end,
    };
    let playhead = engine
        .ui
        .playhead(sequence_id)
        .unwrap_or(seq.playhead)
        .rescale(rate);
    let delta = (playhead - edge_position).frames();

    batch_ripple_edit(engine, sequence_id, edges, Some(delta), None, false, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::commands::clip::tests::{fixture, place};
    use crate::ripple::TrimType;
    use ripplecut_core::FrameRate;
    use ripplecut_model::{Track, TrackKind};

    fn edge(clip_id: Uuid, edge_type: EdgeType) -> EdgeSelector {
        EdgeSelector::new(clip_id, edge_type, TrimType::Ripple)
    }

    #[test]
    fn test_gap_close_across_tracks_with_undo() {
        // V1: P[0,100), Q[150,250). V2: R[200,300). Closing P's trailing
        // gap by 30 pulls Q and R left together; undo restores all.
        let (mut engine, pid, sid, tid) = fixture();
        let v2 = Track::new(sid, TrackKind::Video, 2, 48);
        v2.save(engine.store()).unwrap();
        let p = place(&engine, pid, sid, tid, 0, 100);
        let q = place(&engine, pid, sid, tid, 150, 100);
        let r = place(&engine, pid, sid, v2.id, 200, 100);

        let result = engine.execute(Command::BatchRippleEdit {
            sequence_id: sid,
            edges: vec![edge(p.id, EdgeType::GapAfter)],
            delta_frames: Some(30),
            delta_ms: None,
            dry_run: false,
        });
        assert!(result.success);
        let preview = result.preview.unwrap();
        assert_eq!(preview.clamped_delta_frames, 30);
        assert_eq!(preview.materialized_gaps.len(), 1);

        assert_eq!(
            Clip::load(engine.store(), q.id).unwrap().timeline_start.frames(),
            120
        );
        assert_eq!(
            Clip::load(engine.store(), r.id).unwrap().timeline_start.frames(),
            170
        );
        assert_eq!(
            Clip::load(engine.store(), p.id).unwrap().duration.frames(),
            100
        );
        // Synthetic gaps never reach the store.
        let gap_rows: i64 = engine
            .store()
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM clips WHERE id LIKE 'temp_gap%'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(gap_rows, 0);

        assert!(engine.undo().success);
        assert_eq!(Clip::load(engine.store(), q.id).unwrap(), q);
        assert_eq!(Clip::load(engine.store(), r.id).unwrap(), r);

        assert!(engine.redo().success);
        assert_eq!(
            Clip::load(engine.store(), q.id).unwrap().timeline_start.frames(),
            120
        );
    }

    #[test]
    fn test_media_bounded_trim_clamps() {
        // K[0,100) over 120 frames of media: +50 clamps to +20 and the
        // preview names the limiting edge.
        let (mut engine, pid, sid, tid) = fixture();
        let mut k = place(&engine, pid, sid, tid, 0, 100);
        let l = place(&engine, pid, sid, tid, 150, 50);

        let media = ripplecut_model::Media {
            id: Uuid::new_v4(),
            project_id: pid,
            path: "k.mp4".into(),
            has_video: true,
            has_audio: false,
            duration: RationalTime::new(120, 30, 1),
            video_width: Some(1920),
            video_height: Some(1080),
            frame_rate: FrameRate::FPS_30,
            sample_rate: None,
            channels: None,
        };
        media.save(engine.store()).unwrap();
        k.media_id = Some(media.id);
        k.save(engine.store()).unwrap();

        let result = engine.execute(Command::BatchRippleEdit {
            sequence_id: sid,
            edges: vec![edge(k.id, EdgeType::Out)],
            delta_frames: Some(50),
            delta_ms: None,
            dry_run: false,
        });
        assert!(result.success);
        let preview = result.preview.unwrap();
        assert_eq!(preview.clamped_delta_frames, 20);
        assert_eq!(preview.clamped_edges, vec![format!("{}:out", k.id)]);
        assert_eq!(
            preview.edge_preview.limiter_edge_keys,
            vec![format!("{}:out", k.id)]
        );

        let k_after = Clip::load(engine.store(), k.id).unwrap();
        assert_eq!(k_after.duration.frames(), 120);
        assert_eq!(k_after.source_out.frames(), 120);
        assert_eq!(
            Clip::load(engine.store(), l.id).unwrap().timeline_start.frames(),
            170
        );

        assert!(engine.undo().success);
        assert_eq!(Clip::load(engine.store(), k.id).unwrap(), k);
        assert_eq!(
            Clip::load(engine.store(), l.id).unwrap().timeline_start.frames(),
            150
        );
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let (mut engine, pid, sid, tid) = fixture();
        let p = place(&engine, pid, sid, tid, 0, 100);
        let q = place(&engine, pid, sid, tid, 150, 100);

        let result = engine.execute(Command::BatchRippleEdit {
            sequence_id: sid,
            edges: vec![edge(p.id, EdgeType::GapAfter)],
            delta_frames: Some(30),
            delta_ms: None,
            dry_run: true,
        });
        assert!(result.success);
        let preview = result.preview.unwrap();
        assert!(!preview.planned_mutations.is_empty());

        // Nothing moved, nothing logged.
        assert_eq!(Clip::load(engine.store(), q.id).unwrap(), q);
        assert_eq!(engine.undo_count(), 0);
    }

    #[test]
    fn test_single_edge_ripple_edit_delegates() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 100);
        let b = place(&engine, pid, sid, tid, 100, 100);

        // Trim 30 off A's head; B closes up.
        let result = engine.execute(Command::RippleEdit {
            sequence_id: sid,
            edge: {
                let mut e = edge(a.id, EdgeType::In);
                e.trim_type = TrimType::Ripple;
                e
            },
            delta_frames: Some(30),
            delta_ms: None,
            dry_run: false,
        });
        assert!(result.success);

        let a_after = Clip::load(engine.store(), a.id).unwrap();
        assert_eq!(a_after.duration.frames(), 70);
        assert_eq!(a_after.source_in.frames(), 30);
        assert_eq!(
            Clip::load(engine.store(), b.id).unwrap().timeline_start.frames(),
            70
        );
    }

    #[test]
    fn test_zero_delta_is_successful_noop() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 100);

        let result = engine.execute(Command::BatchRippleEdit {
            sequence_id: sid,
            edges: vec![edge(a.id, EdgeType::Out)],
            delta_frames: Some(0),
            delta_ms: None,
            dry_run: false,
        });
        assert!(result.success);
        assert!(result.preview.unwrap().is_noop());
        assert_eq!(Clip::load(engine.store(), a.id).unwrap(), a);
    }

    #[test]
    fn test_delta_ms_converts_at_sequence_rate() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 100);

        // 1000ms at 30fps is 30 frames.
        let result = engine.execute(Command::BatchRippleEdit {
            sequence_id: sid,
            edges: vec![{
                let mut e = edge(a.id, EdgeType::Out);
                e.trim_type = TrimType::Roll;
                e
            }],
            delta_frames: None,
            delta_ms: Some(1000.0),
            dry_run: false,
        });
        assert!(result.success);
        assert_eq!(Clip::load(engine.store(), a.id).unwrap().duration.frames(), 130);
    }

    #[test]
    fn test_extend_edit_reaches_playhead() {
        let (mut engine, pid, sid, tid) = fixture();
        let a = place(&engine, pid, sid, tid, 0, 100);
        let b = place(&engine, pid, sid, tid, 100, 100);
        engine
            .ui_mut()
            .set_playhead(sid, RationalTime::new(130, 30, 1));

        let result = engine.execute(Command::ExtendEdit {
            sequence_id: sid,
            edges: vec![{
                let mut e = edge(a.id, EdgeType::Out);
                e.lead = true;
                e
            }],
        });
        assert!(result.success);

        // A's out edge lands on the playhead; B ripples right.
        let a_after = Clip::load(engine.store(), a.id).unwrap();
        assert_eq!(a_after.duration.frames(), 130);
        assert_eq!(
            Clip::load(engine.store(), b.id).unwrap().timeline_start.frames(),
            130
        );
    }
}
