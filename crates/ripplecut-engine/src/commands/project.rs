//! Project-level commands.

use tracing::info;
use uuid::Uuid;

use ripplecut_core::{FrameRate, Result};
use ripplecut_model::{Bin, Project, Sequence, TrackKind};

use crate::command::CommandState;
use crate::registry::Engine;

use super::stable_id;

pub(crate) fn create_project(
    engine: &mut Engine,
    name: &str,
    state: &mut CommandState,
) -> Result<()> {
    let mut id_slot = match state {
        CommandState::CreateProject { project_id } => Some(*project_id),
        _ => None,
    };
    let id = stable_id(&mut id_slot);

    let mut project = Project::new(name);
    project.id = id;
    project.save(&engine.store)?;
    info!(%id, name, "created project");

    *state = CommandState::CreateProject { project_id: id };
    Ok(())
}

pub(crate) fn undo_create_project(engine: &mut Engine, project_id: Uuid) -> Result<()> {
    if let Some(project) = Project::load_optional(&engine.store, project_id)? {
        project.delete(&engine.store)?;
    }
    Ok(())
}

/// Verifies existence only; no store mutation.
pub(crate) fn load_project(engine: &mut Engine, project_id: Uuid) -> Result<()> {
    Project::load(&engine.store, project_id)?;
    Ok(())
}

/// Create the default editing environment for a fresh project: a root
/// bin and an initial timeline sequence with the six default tracks.
pub(crate) fn setup_project(
    engine: &mut Engine,
    project_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let project = Project::load(&engine.store, project_id)?;

    let (mut bin_slot, mut seq_slot, track_ids) = match state {
        CommandState::SetupProject {
            bin_id,
            sequence_id,
            track_ids,
        } => (Some(*bin_id), Some(*sequence_id), track_ids.clone()),
        _ => (None, None, Vec::new()),
    };

    let mut root = Bin::new(project.id, None, "Master", 0);
    root.id = stable_id(&mut bin_slot);
    root.save(&engine.store)?;

    let mut seq = Sequence::new(project.id, "Sequence 1", FrameRate::FPS_30, 1920, 1080);
    seq.id = stable_id(&mut seq_slot);
    seq.save(&engine.store)?;

    let created_tracks =
        super::sequence::create_default_tracks(engine, &seq, &project, &track_ids)?;
    engine
        .bucket
        .sequence_meta(seq.id, "created", serde_json::Value::Null);

    *state = CommandState::SetupProject {
        bin_id: root.id,
        sequence_id: seq.id,
        track_ids: created_tracks,
    };
    Ok(())
}

pub(crate) fn undo_setup_project(
    engine: &mut Engine,
    bin_id: Uuid,
    sequence_id: Uuid,
) -> Result<()> {
    if let Some(seq) = Sequence::load_optional(&engine.store, sequence_id)? {
        seq.delete(&engine.store)?;
    }
    if let Some(bin) = Bin::load_optional(&engine.store, bin_id)? {
        bin.delete(&engine.store)?;
    }
    Ok(())
}

/// Default track heights come from the per-project template, floored at
/// 24 pixels.
pub(crate) fn template_height(project: &Project, kind: TrackKind) -> u32 {
    let key = match kind {
        TrackKind::Video => "video_track_height",
        TrackKind::Audio => "audio_track_height",
    };
    let configured = project
        .settings
        .as_ref()
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(match kind {
            TrackKind::Video => 48,
            TrackKind::Audio => 32,
        }) as u32;
    configured.max(24)
}
