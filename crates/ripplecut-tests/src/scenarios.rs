//! End-to-end command scenarios at 30 fps, times in frames.

use uuid::Uuid;

use ripplecut_core::TimeValue;
use ripplecut_engine::{Command, EdgeSelector, EdgeType, TrimType};
use ripplecut_model::{Clip, Media, Property, Sequence, SequenceKind};

use crate::harness::{frames, Rig, RATE};

fn media_row(rig: &Rig, path: &str, duration: i64) -> Media {
    let media = Media {
        id: Uuid::new_v4(),
        project_id: rig.project_id,
        path: path.into(),
        has_video: true,
        has_audio: false,
        duration: frames(duration),
        video_width: Some(1920),
        video_height: Some(1080),
        frame_rate: RATE,
        sample_rate: None,
        channels: None,
    };
    media.save(rig.engine.store()).unwrap();
    media
}

fn edge(clip_id: Uuid, edge_type: EdgeType) -> EdgeSelector {
    EdgeSelector::new(clip_id, edge_type, TrimType::Ripple)
}

// ── S1: split ──────────────────────────────────────────────────

#[test]
fn s1_split_clip_at_120() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 300);

    assert!(rig
        .engine
        .execute(Command::SplitClip {
            clip_id: a.id,
            split_value: TimeValue::Frames(120),
        })
        .success);

    let first = rig.clip(a.id);
    assert_eq!(first.timeline_start.frames(), 0);
    assert_eq!(first.duration.frames(), 120);
    assert_eq!(first.source_in.frames(), 0);
    assert_eq!(first.source_out.frames(), 120);

    let clips = rig.track_clips(rig.v1);
    assert_eq!(clips.len(), 2);
    let second = clips.iter().find(|c| c.id != a.id).unwrap();
    assert_eq!(second.timeline_start.frames(), 120);
    assert_eq!(second.duration.frames(), 180);
    assert_eq!(second.source_in.frames(), 120);
    assert_eq!(second.source_out.frames(), 300);
    rig.assert_no_overlaps();
    rig.assert_clip_invariants();

    // Undo restores A exactly; B is gone.
    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(a.id), a);
    assert_eq!(rig.track_clips(rig.v1).len(), 1);
}

// ── S2: overwrite with partial overlap ─────────────────────────

#[test]
fn s2_overwrite_trims_underlay() {
    let mut rig = Rig::new();
    let c = rig.place(rig.v1, 50, 100);
    let media = media_row(&rig, "over.mp4", 600);

    assert!(rig
        .engine
        .execute(Command::Overwrite {
            sequence_id: rig.sequence_id,
            track_id: rig.v1,
            media_id: Some(media.id),
            master_clip_id: None,
            overwrite_time: TimeValue::Frames(100),
            duration: Some(TimeValue::Frames(60)),
            source_in: None,
            advance_playhead: false,
        })
        .success);

    let trimmed = rig.clip(c.id);
    assert_eq!(trimmed.timeline_start.frames(), 50);
    assert_eq!(trimmed.duration.frames(), 50);
    assert_eq!(
        trimmed.source_out.frames(),
        trimmed.source_in.frames() + 50
    );
    let clips = rig.track_clips(rig.v1);
    assert_eq!(clips.len(), 2);
    let new_clip = clips.iter().find(|x| x.id != c.id).unwrap();
    assert_eq!(new_clip.timeline_start.frames(), 100);
    assert_eq!(new_clip.duration.frames(), 60);
    rig.assert_no_overlaps();

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(c.id), c);
    assert_eq!(rig.track_clips(rig.v1).len(), 1);
}

// ── S3: insert ripples forward and trims the straddler ─────────

#[test]
fn s3_insert_ripple_forward() {
    let mut rig = Rig::new();
    let x = rig.place(rig.v1, 0, 50);
    let y = rig.place(rig.v1, 50, 50);
    let media = media_row(&rig, "ins.mp4", 600);

    assert!(rig
        .engine
        .execute(Command::Insert {
            sequence_id: rig.sequence_id,
            track_id: rig.v1,
            media_id: Some(media.id),
            master_clip_id: None,
            insert_time: TimeValue::Frames(30),
            duration: Some(TimeValue::Frames(20)),
            source_in: None,
            advance_playhead: false,
        })
        .success);

    // X straddled the insert point: the resolver trims it to 30 frames.
    assert_eq!(rig.clip(x.id).duration.frames(), 30);
    // Y rippled forward by the inserted duration.
    assert_eq!(rig.clip(y.id).timeline_start.frames(), 70);
    let inserted = rig
        .track_clips(rig.v1)
        .into_iter()
        .find(|c| c.id != x.id && c.id != y.id)
        .unwrap();
    assert_eq!(inserted.timeline_start.frames(), 30);
    assert_eq!(inserted.duration.frames(), 20);
    rig.assert_no_overlaps();

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(x.id), x);
    assert_eq!(rig.clip(y.id), y);
}

// ── S4: batch ripple over a gap keeps multi-track sync ─────────

#[test]
fn s4_gap_close_shifts_every_track() {
    let mut rig = Rig::new();
    let p = rig.place(rig.v1, 0, 100);
    let q = rig.place(rig.v1, 150, 100);
    let r = rig.place(rig.v2, 200, 100);

    let result = rig.engine.execute(Command::BatchRippleEdit {
        sequence_id: rig.sequence_id,
        edges: vec![edge(p.id, EdgeType::GapAfter)],
        delta_frames: Some(30),
        delta_ms: None,
        dry_run: false,
    });
    assert!(result.success);

    // The gap closes by 30: Q follows the gap's end edge and V2 shifts
    // by the same downstream amount.
    assert_eq!(rig.clip(p.id).duration.frames(), 100);
    assert_eq!(rig.clip(q.id).timeline_start.frames(), 120);
    assert_eq!(rig.clip(r.id).timeline_start.frames(), 170);
    rig.assert_no_overlaps();
    rig.assert_clip_invariants();

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(p.id), p);
    assert_eq!(rig.clip(q.id), q);
    assert_eq!(rig.clip(r.id), r);
}

// ── S5: media-bounded trim clamps instead of failing ───────────

#[test]
fn s5_media_bounded_trim() {
    let mut rig = Rig::new();
    let mut k = rig.place(rig.v1, 0, 100);
    let l = rig.place(rig.v1, 150, 50);
    let media = media_row(&rig, "k.mp4", 120);
    k.media_id = Some(media.id);
    k.save(rig.engine.store()).unwrap();

    let result = rig.engine.execute(Command::BatchRippleEdit {
        sequence_id: rig.sequence_id,
        edges: vec![edge(k.id, EdgeType::Out)],
        delta_frames: Some(50),
        delta_ms: None,
        dry_run: false,
    });
    assert!(result.success);
    let preview = result.preview.unwrap();
    assert_eq!(preview.clamped_delta_frames, 20);
    assert!(preview
        .clamped_edges
        .contains(&format!("{}:out", k.id)));

    let k_after = rig.clip(k.id);
    assert_eq!(k_after.duration.frames(), 120);
    assert_eq!(k_after.source_out.frames(), 120);
    assert_eq!(rig.clip(l.id).timeline_start.frames(), 170);
    rig.assert_no_overlaps();
}

// ── S6: toggle enable round-trips through undo/redo/replay ─────

#[test]
fn s6_toggle_enable_round_trip() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 50);
    let b = rig.place(rig.v2, 0, 50);

    assert!(rig
        .engine
        .execute(Command::ToggleClipEnabled {
            sequence_id: rig.sequence_id,
            clip_ids: vec![a.id, b.id],
        })
        .success);
    assert!(!rig.clip(a.id).enabled);
    assert!(!rig.clip(b.id).enabled);

    assert!(rig.engine.undo().success);
    assert!(rig.clip(a.id).enabled);
    assert!(rig.clip(b.id).enabled);

    assert!(rig.engine.redo().success);
    assert!(!rig.clip(a.id).enabled);
    assert!(!rig.clip(b.id).enabled);
}

// ── Import + master clips on the timeline ──────────────────────

#[test]
fn import_then_edit_from_master() {
    let mut rig = Rig::new();
    assert!(rig
        .engine
        .execute(Command::ImportMedia {
            project_id: rig.project_id,
            file_paths: vec!["footage/interview.mp4".into()],
            file_path: None,
        })
        .success);

    let master = Sequence::load_for_project(rig.engine.store(), rig.project_id)
        .unwrap()
        .into_iter()
        .find(|s| s.kind == SequenceKind::Masterclip)
        .unwrap();

    // Give the master's video stream a property to inherit.
    let video_track = ripplecut_model::Track::load_for_sequence(rig.engine.store(), master.id)
        .unwrap()
        .into_iter()
        .find(|t| t.kind == ripplecut_model::TrackKind::Video)
        .unwrap();
    let streams = Clip::load_for_sequence(rig.engine.store(), master.id).unwrap();
    let video_stream = streams
        .iter()
        .find(|c| c.track_id == Some(video_track.id))
        .unwrap();
    Property::upsert(
        rig.engine.store(),
        video_stream.id,
        "opacity",
        &serde_json::json!({"value": 0.9}),
        "NUMBER",
        None,
    )
    .unwrap();

    assert!(rig
        .engine
        .execute(Command::CreateClip {
            sequence_id: rig.sequence_id,
            track_id: rig.v1,
            media_id: None,
            master_clip_id: Some(master.id),
            timeline_start: TimeValue::Frames(0),
            duration: Some(TimeValue::Frames(200)),
            source_in: None,
        })
        .success);

    let placed = rig.track_clips(rig.v1).remove(0);
    assert_eq!(placed.duration.frames(), 200);
    assert_eq!(placed.source_sequence_id, Some(master.id));
    assert!(placed.parent_clip_id.is_some());
    // Properties copied from the master stream.
    let inherited = Property::get(rig.engine.store(), placed.id, "opacity")
        .unwrap()
        .unwrap();
    assert_eq!(inherited.value, serde_json::json!({"value": 0.9}));
}

// ── Ripple delete both forms ───────────────────────────────────

#[test]
fn ripple_delete_gap_closes_across_tracks() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 100);
    let b = rig.place(rig.v1, 150, 100);
    let c = rig.place(rig.v2, 160, 50);

    // The gap [100,150) is clear on every track.
    assert!(rig
        .engine
        .execute(Command::RippleDelete {
            sequence_id: rig.sequence_id,
            track_id: rig.v1,
            gap_start: TimeValue::Frames(100),
            gap_duration: TimeValue::Frames(50),
        })
        .success);

    assert_eq!(rig.clip(a.id).timeline_start.frames(), 0);
    assert_eq!(rig.clip(b.id).timeline_start.frames(), 100);
    assert_eq!(rig.clip(c.id).timeline_start.frames(), 110);
    rig.assert_no_overlaps();

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(b.id), b);
    assert_eq!(rig.clip(c.id), c);
}

#[test]
fn ripple_delete_gap_rejects_occluded_window() {
    let mut rig = Rig::new();
    rig.place(rig.v1, 0, 100);
    // V2 covers the window even though V1 is clear.
    rig.place(rig.v2, 110, 50);

    let result = rig.engine.execute(Command::RippleDelete {
        sequence_id: rig.sequence_id,
        track_id: rig.v1,
        gap_start: TimeValue::Frames(100),
        gap_duration: TimeValue::Frames(50),
    });
    assert!(!result.success);
    assert!(rig.engine.last_error().unwrap().contains("occluded"));
}

#[test]
fn ripple_delete_selection_block_mode() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 50);
    let doomed = rig.place(rig.v1, 100, 50);
    let tail_v1 = rig.place(rig.v1, 200, 50);
    let tail_v2 = rig.place(rig.v2, 300, 50);

    assert!(rig
        .engine
        .execute(Command::RippleDeleteSelection {
            sequence_id: rig.sequence_id,
            clip_ids: vec![doomed.id],
            block_mode: true,
        })
        .success);

    assert!(Clip::load_optional(rig.engine.store(), doomed.id)
        .unwrap()
        .is_none());
    assert_eq!(rig.clip(a.id).timeline_start.frames(), 0);
    // Both tracks collapse by the 50-frame union window.
    assert_eq!(rig.clip(tail_v1.id).timeline_start.frames(), 150);
    assert_eq!(rig.clip(tail_v2.id).timeline_start.frames(), 250);

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(doomed.id), doomed);
    assert_eq!(rig.clip(tail_v1.id), tail_v1);
    assert_eq!(rig.clip(tail_v2.id), tail_v2);
}

// ── Batch command grouping ─────────────────────────────────────

#[test]
fn batch_command_undoes_as_one_unit() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 300);

    let batch: Command = serde_json::from_value(serde_json::json!({
        "name": "BatchCommand",
        "parameters": {
            "commands": [
                {"name": "SplitClip",
                 "parameters": {"clip_id": a.id, "split_value": 100}},
                {"name": "ToggleClipEnabled",
                 "parameters": {"sequence_id": rig.sequence_id, "clip_ids": [a.id]}},
            ],
        },
    }))
    .unwrap();

    assert!(rig.engine.execute(batch).success);
    assert_eq!(rig.track_clips(rig.v1).len(), 2);
    assert!(!rig.clip(a.id).enabled);

    // One undo reverts the whole group.
    assert!(rig.engine.undo().success);
    assert_eq!(rig.track_clips(rig.v1).len(), 1);
    assert_eq!(rig.clip(a.id), a);
}

// ── Roll trims ─────────────────────────────────────────────────

#[test]
fn roll_trim_moves_edge_without_ripple() {
    let mut rig = Rig::new();
    let a = rig.place(rig.v1, 0, 100);
    let b = rig.place(rig.v1, 150, 50);

    let mut e = edge(a.id, EdgeType::Out);
    e.trim_type = TrimType::Roll;
    assert!(rig
        .engine
        .execute(Command::BatchRippleEdit {
            sequence_id: rig.sequence_id,
            edges: vec![e],
            delta_frames: Some(30),
            delta_ms: None,
            dry_run: false,
        })
        .success);

    assert_eq!(rig.clip(a.id).duration.frames(), 130);
    // No downstream shift for a roll.
    assert_eq!(rig.clip(b.id).timeline_start.frames(), 150);
    rig.assert_no_overlaps();
}

// ── Gap-edge roll (boundary moves, duration kept) ──────────────

#[test]
fn gap_roll_moves_boundary_only() {
    let mut rig = Rig::new();
    let p = rig.place(rig.v1, 0, 100);
    let q = rig.place(rig.v1, 150, 100);

    let mut e = edge(p.id, EdgeType::GapAfter);
    e.trim_type = TrimType::Roll;
    let result = rig.engine.execute(Command::BatchRippleEdit {
        sequence_id: rig.sequence_id,
        edges: vec![e],
        delta_frames: Some(20),
        delta_ms: None,
        dry_run: false,
    });
    assert!(result.success);

    // A rolled gap boundary shifts its right neighbour without any trim.
    assert_eq!(rig.clip(p.id).duration.frames(), 100);
    assert_eq!(rig.clip(q.id).timeline_start.frames(), 170);
    rig.assert_no_overlaps();

    assert!(rig.engine.undo().success);
    assert_eq!(rig.clip(q.id), q);
}
