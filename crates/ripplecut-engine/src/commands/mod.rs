//! Command executors and undoers.
//!
//! Each module implements one family of commands as free functions over
//! the engine. `dispatch` routes a record to its executor; `undo_record`
//! routes it to its undoer using the state the executor persisted.

pub mod bins;
pub mod clip;
pub mod import;
pub mod navigate;
pub mod project;
pub mod ripple_cmd;
pub mod sequence;
pub mod structural;

use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_model::{Clip, OcclusionAction, Sequence};

use crate::command::{Command, CommandRecord, CommandState};
use crate::registry::Engine;
use crate::ripple::RipplePreview;

/// Route a record to its executor. Returns a preview for dry-run ripple
/// commands; everything else returns `None`.
pub(crate) fn dispatch(
    engine: &mut Engine,
    record: &mut CommandRecord,
) -> Result<Option<RipplePreview>> {
    let command = record.command.clone();
    let state = &mut record.state;
    match command {
        Command::CreateProject { name } => {
            project::create_project(engine, &name, state).map(|_| None)
        }
        Command::LoadProject { project_id } => {
            project::load_project(engine, project_id).map(|_| None)
        }
        Command::SetupProject { project_id } => {
            project::setup_project(engine, project_id, state).map(|_| None)
        }
        Command::CreateSequence {
            project_id,
            name,
            frame_rate,
            width,
            height,
        } => sequence::create_sequence(
            engine,
            project_id,
            &name,
            frame_rate.to_rate(),
            width,
            height,
            state,
        )
        .map(|_| None),
        Command::SetSequenceMetadata {
            sequence_id,
            field,
            value,
        } => sequence::set_sequence_metadata(engine, sequence_id, &field, value, state)
            .map(|_| None),
        Command::DeleteSequence { sequence_id } => {
            sequence::delete_sequence(engine, sequence_id, state).map(|_| None)
        }
        Command::AddTrack {
            sequence_id,
            kind,
            height,
        } => sequence::add_track(engine, sequence_id, kind, height, state).map(|_| None),
        Command::NewBin {
            project_id,
            name,
            parent_id,
        } => bins::new_bin(engine, project_id, &name, parent_id, state).map(|_| None),
        Command::DeleteBin { bin_id } => bins::delete_bin(engine, bin_id, state).map(|_| None),
        Command::RenameItem {
            item_type,
            item_id,
            name,
        } => bins::rename_item(engine, &item_type, item_id, &name, state).map(|_| None),
        Command::MoveToBin {
            bin_id,
            parent_id,
            insert_index,
        } => bins::move_to_bin(engine, bin_id, parent_id, insert_index, state).map(|_| None),
        Command::ImportMedia {
            project_id,
            file_paths,
            file_path,
        } => {
            let mut paths = file_paths;
            if let Some(single) = file_path {
                paths.push(single);
            }
            import::import_media(engine, project_id, &paths, state).map(|_| None)
        }
        Command::DuplicateMasterClip {
            masterclip_sequence_id,
        } => import::duplicate_master_clip(engine, masterclip_sequence_id, state).map(|_| None),
        Command::DeleteMasterClip {
            masterclip_sequence_id,
        } => import::delete_master_clip(engine, masterclip_sequence_id, state).map(|_| None),
        Command::CreateClip {
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            timeline_start,
            duration,
            source_in,
        } => structural::create_clip(
            engine,
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            timeline_start,
            duration,
            source_in,
            state,
        )
        .map(|_| None),
        Command::Insert {
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            insert_time,
            duration,
            source_in,
            advance_playhead,
        } => structural::insert(
            engine,
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            insert_time,
            duration,
            source_in,
            advance_playhead,
            state,
        )
        .map(|_| None),
        Command::Overwrite {
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            overwrite_time,
            duration,
            source_in,
            advance_playhead,
        } => structural::overwrite(
            engine,
            sequence_id,
            track_id,
            media_id,
            master_clip_id,
            overwrite_time,
            duration,
            source_in,
            advance_playhead,
            state,
        )
        .map(|_| None),
        Command::SplitClip {
            clip_id,
            split_value,
        } => structural::split_clip(engine, clip_id, split_value, state).map(|_| None),
        Command::Split { sequence_id, at } => {
            structural::split(engine, sequence_id, at, state).map(|_| None)
        }
        Command::MoveClipToTrack { clip_id, track_id } => {
            clip::move_clip_to_track(engine, clip_id, track_id, state).map(|_| None)
        }
        Command::DeleteClip { clip_id } => {
            clip::delete_clip(engine, clip_id, state).map(|_| None)
        }
        Command::ToggleClipEnabled {
            sequence_id,
            clip_ids,
        } => clip::toggle_clip_enabled(engine, sequence_id, &clip_ids, state).map(|_| None),
        Command::SetClipProperty {
            clip_id,
            property_name,
            value,
            property_type,
            default_value,
        } => clip::set_clip_property(
            engine,
            clip_id,
            &property_name,
            value,
            property_type.as_deref(),
            default_value,
            state,
        )
        .map(|_| None),
        Command::RippleDelete {
            sequence_id,
            track_id,
            gap_start,
            gap_duration,
        } => {
            structural::ripple_delete(engine, sequence_id, track_id, gap_start, gap_duration, state)
                .map(|_| None)
        }
        Command::RippleDeleteSelection {
            sequence_id,
            clip_ids,
            block_mode,
        } => structural::ripple_delete_selection(engine, sequence_id, &clip_ids, block_mode, state)
            .map(|_| None),
        Command::Nudge {
            sequence_id,
            delta_frames,
            clip_ids,
        } => clip::nudge(engine, sequence_id, delta_frames, &clip_ids, state).map(|_| None),
        Command::RippleEdit {
            sequence_id,
            edge,
            delta_frames,
            delta_ms,
            dry_run,
        } => ripple_cmd::batch_ripple_edit(
            engine,
            sequence_id,
            &[edge],
            delta_frames,
            delta_ms,
            dry_run,
            state,
        ),
        Command::BatchRippleEdit {
            sequence_id,
            edges,
            delta_frames,
            delta_ms,
            dry_run,
        } => ripple_cmd::batch_ripple_edit(
            engine,
            sequence_id,
            &edges,
            delta_frames,
            delta_ms,
            dry_run,
            state,
        ),
        Command::ExtendEdit {
            sequence_id,
            edges,
        } => ripple_cmd::extend_edit(engine, sequence_id, &edges, state),
        Command::MatchFrame { sequence_id } => {
            navigate::match_frame(engine, sequence_id).map(|_| None)
        }
        Command::SelectAll { sequence_id } => {
            navigate::select_all(engine, sequence_id).map(|_| None)
        }
        Command::DeselectAll { sequence_id } => {
            navigate::deselect_all(engine, sequence_id).map(|_| None)
        }
        Command::GoToStart { sequence_id } => {
            navigate::go_to_start(engine, sequence_id).map(|_| None)
        }
        Command::GoToEnd { sequence_id } => {
            navigate::go_to_end(engine, sequence_id).map(|_| None)
        }
        Command::GoToPrevEdit { sequence_id } => {
            navigate::go_to_edit(engine, sequence_id, false).map(|_| None)
        }
        Command::GoToNextEdit { sequence_id } => {
            navigate::go_to_edit(engine, sequence_id, true).map(|_| None)
        }
        Command::ToggleSnapping => {
            engine.ui.snapping = !engine.ui.snapping;
            Ok(None)
        }
        Command::BatchCommand { commands } => {
            // Nested records replay themselves from the log; only a fresh
            // execute runs them here.
            if state.is_empty() {
                for nested in commands {
                    engine.execute_nested(nested)?;
                }
            }
            *state = CommandState::Batch;
            Ok(None)
        }
    }
}

/// Route a record to its undoer.
pub(crate) fn undo_record(engine: &mut Engine, record: &CommandRecord) -> Result<()> {
    match (&record.command, &record.state) {
        (_, CommandState::Empty) | (_, CommandState::Batch) => Ok(()),
        (_, CommandState::CreateProject { project_id }) => {
            project::undo_create_project(engine, *project_id)
        }
        (_, CommandState::SetupProject {
            bin_id,
            sequence_id,
            ..
        }) => project::undo_setup_project(engine, *bin_id, *sequence_id),
        (_, CommandState::CreateSequence { sequence_id, .. }) => {
            sequence::undo_create_sequence(engine, *sequence_id)
        }
        (Command::SetSequenceMetadata {
            sequence_id, field, ..
        }, CommandState::SetSequenceMetadata { previous }) => {
            sequence::undo_set_sequence_metadata(engine, *sequence_id, field, previous.clone())
        }
        (_, CommandState::DeleteSequence {
            sequence,
            tracks,
            clips,
            properties,
        }) => sequence::undo_delete_sequence(engine, sequence, tracks, clips, properties),
        (Command::AddTrack { .. }, CommandState::AddTrack { track_id }) => {
            sequence::undo_add_track(engine, *track_id)
        }
        (_, CommandState::NewBin { bin_id }) => bins::undo_new_bin(engine, *bin_id),
        (_, CommandState::DeleteBin { bin }) => bins::undo_delete_bin(engine, bin),
        (Command::RenameItem {
            item_type, item_id, ..
        }, CommandState::RenameItem { previous_name }) => {
            bins::rename_target(engine, item_type, *item_id, previous_name)
        }
        (Command::MoveToBin { bin_id, .. }, CommandState::MoveToBin {
            previous_parent,
            previous_index,
        }) => bins::undo_move_to_bin(engine, *bin_id, *previous_parent, *previous_index),
        (_, CommandState::ImportMedia { files }) => import::undo_import_media(engine, files),
        (_, CommandState::DuplicateMasterClip {
            sequence_id,
            clip_ids,
            ..
        }) => import::undo_duplicate_master_clip(engine, *sequence_id, clip_ids),
        (_, CommandState::CreateClip { ledger, .. })
        | (_, CommandState::Insert { ledger, .. })
        | (_, CommandState::Overwrite { ledger, .. })
        | (_, CommandState::MoveClipToTrack { ledger, .. })
        | (_, CommandState::RippleDelete { ledger, .. })
        | (_, CommandState::RippleDeleteSelection { ledger })
        | (_, CommandState::Nudge { ledger })
        | (_, CommandState::Ripple { ledger, .. }) => {
            let Engine { store, bucket, .. } = engine;
            ledger.revert(store, bucket)
        }
        (_, CommandState::SplitClip {
            second_clip_id,
            original,
        }) => structural::undo_split_clip(engine, *second_clip_id, original),
        (_, CommandState::Split { .. }) => Ok(()),
        (_, CommandState::DeleteClip { clip, properties }) => {
            clip::undo_delete_clip(engine, clip, properties)
        }
        (_, CommandState::ToggleClipEnabled { changes }) => {
            clip::apply_toggle_changes(engine, changes, false)
        }
        (Command::SetClipProperty { clip_id, property_name, .. }, CommandState::SetClipProperty {
            previous,
            created_property_id,
            degraded,
        }) => clip::undo_set_clip_property(
            engine,
            *clip_id,
            property_name,
            previous.as_ref(),
            *created_property_id,
            *degraded,
        ),
        (command, state) => Err(EngineError::UndoFailure(format!(
            "no undoer for {} with state {:?}",
            command.spec().name,
            state
        ))),
    }
}

// ── Shared helpers ─────────────────────────────────────────────

/// Load a sequence or fail with EntityNotFound.
pub(crate) fn load_sequence(engine: &Engine, sequence_id: Uuid) -> Result<Sequence> {
    Sequence::load(&engine.store, sequence_id)
}

/// Clips of a sequence, preferring the UI cache when it reflects the
/// active sequence.
pub(crate) fn sequence_clips(engine: &Engine, sequence_id: Uuid) -> Result<Vec<Clip>> {
    if engine.ui.reflects(sequence_id) {
        if let Some(mut clips) = engine.ui.clips_for(sequence_id) {
            clips.sort_by_key(|c| c.timeline_start.frames());
            return Ok(clips);
        }
    }
    Clip::load_for_sequence(&engine.store, sequence_id)
}

/// Make occlusion-insert ids deterministic across replay: reuse persisted
/// ids in order, recording freshly generated ones.
pub(crate) fn assign_insert_ids(actions: &mut [OcclusionAction], ids: &mut Vec<Uuid>) {
    let replaying = !ids.is_empty();
    let mut next = 0usize;
    for action in actions.iter_mut() {
        if let OcclusionAction::Insert { clip, .. } = action {
            if replaying {
                if let Some(id) = ids.get(next) {
                    clip.id = *id;
                }
            } else {
                ids.push(clip.id);
            }
            next += 1;
        }
    }
}

/// Reuse a persisted id, or record a fresh one.
pub(crate) fn stable_id(slot: &mut Option<Uuid>) -> Uuid {
    match slot {
        Some(id) => *id,
        None => {
            let id = Uuid::new_v4();
            *slot = Some(id);
            id
        }
    }
}
