//! Bin-tree commands: NewBin, DeleteBin, RenameItem, MoveToBin.

use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_model::{Bin, Clip, Project, Sequence};

use crate::command::CommandState;
use crate::registry::Engine;

use super::stable_id;

pub(crate) fn new_bin(
    engine: &mut Engine,
    project_id: Uuid,
    name: &str,
    parent_id: Option<Uuid>,
    state: &mut CommandState,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EngineError::MissingParameter("name".into()));
    }
    Project::load(&engine.store, project_id)?;
    if let Some(parent) = parent_id {
        Bin::load(&engine.store, parent)?;
    }

    let mut id_slot = match state {
        CommandState::NewBin { bin_id } => Some(*bin_id),
        _ => None,
    };
    let siblings = Bin::children(&engine.store, project_id, parent_id)?;
    let mut bin = Bin::new(project_id, parent_id, name.trim(), siblings.len() as i64);
    bin.id = stable_id(&mut id_slot);
    bin.save(&engine.store)?;

    *state = CommandState::NewBin { bin_id: bin.id };
    Ok(())
}

pub(crate) fn undo_new_bin(engine: &mut Engine, bin_id: Uuid) -> Result<()> {
    if let Some(bin) = Bin::load_optional(&engine.store, bin_id)? {
        bin.delete(&engine.store)?;
    }
    Ok(())
}

pub(crate) fn delete_bin(
    engine: &mut Engine,
    bin_id: Uuid,
    state: &mut CommandState,
) -> Result<()> {
    let bin = Bin::load(&engine.store, bin_id)?;
    bin.delete(&engine.store)?;
    *state = CommandState::DeleteBin { bin };
    Ok(())
}

pub(crate) fn undo_delete_bin(engine: &mut Engine, bin: &Bin) -> Result<()> {
    bin.save(&engine.store)
}

/// Rename a bin, sequence, clip, or project. Unknown target types are a
/// constraint violation; empty names are rejected.
pub(crate) fn rename_item(
    engine: &mut Engine,
    item_type: &str,
    item_id: Uuid,
    name: &str,
    state: &mut CommandState,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EngineError::ConstraintViolation(
            "cannot rename to an empty name".into(),
        ));
    }
    let previous_name = current_name(engine, item_type, item_id)?;
    rename_target(engine, item_type, item_id, name.trim())?;
    *state = CommandState::RenameItem { previous_name };
    Ok(())
}

fn current_name(engine: &Engine, item_type: &str, item_id: Uuid) -> Result<String> {
    match item_type {
        "bin" => Ok(Bin::load(&engine.store, item_id)?.name),
        "sequence" => Ok(Sequence::load(&engine.store, item_id)?.name),
        "clip" => Ok(Clip::load(&engine.store, item_id)?.name),
        "project" => Ok(Project::load(&engine.store, item_id)?.name),
        other => Err(EngineError::ConstraintViolation(format!(
            "unknown rename target type: {}",
            other
        ))),
    }
}

pub(crate) fn rename_target(
    engine: &mut Engine,
    item_type: &str,
    item_id: Uuid,
    name: &str,
) -> Result<()> {
    match item_type {
        "bin" => {
            let mut bin = Bin::load(&engine.store, item_id)?;
            bin.name = name.to_string();
            bin.save(&engine.store)
        }
        "sequence" => {
            let mut seq = Sequence::load(&engine.store, item_id)?;
            seq.name = name.to_string();
            seq.save(&engine.store)?;
            engine.bucket.sequence_meta(
                item_id,
                "renamed",
                serde_json::json!({"name": name}),
            );
            Ok(())
        }
        "clip" => {
            let mut clip = Clip::load(&engine.store, item_id)?;
            clip.name = name.to_string();
            clip.save(&engine.store)
        }
        "project" => {
            let mut project = Project::load(&engine.store, item_id)?;
            project.name = name.to_string();
            project.save(&engine.store)
        }
        other => Err(EngineError::ConstraintViolation(format!(
            "unknown rename target type: {}",
            other
        ))),
    }
}

/// Re-parent a bin within the tree.
pub(crate) fn move_to_bin(
    engine: &mut Engine,
    bin_id: Uuid,
    parent_id: Option<Uuid>,
    insert_index: Option<i64>,
    state: &mut CommandState,
) -> Result<()> {
    let mut bin = Bin::load(&engine.store, bin_id)?;
    if let Some(parent) = parent_id {
        if parent == bin_id {
            return Err(EngineError::ConstraintViolation(
                "cannot move a bin into itself".into(),
            ));
        }
        // Reject cycles: the new parent must not live under this bin.
        let mut cursor = Bin::load(&engine.store, parent)?;
        loop {
            if cursor.id == bin_id {
                return Err(EngineError::ConstraintViolation(
                    "cannot move a bin under its own descendant".into(),
                ));
            }
            match cursor.parent_id {
                Some(up) => cursor = Bin::load(&engine.store, up)?,
                None => break,
            }
        }
    }

    let previous_parent = bin.parent_id;
    let previous_index = bin.insert_index;
    bin.parent_id = parent_id;
    bin.insert_index = insert_index.unwrap_or_else(|| {
        Bin::children(&engine.store, bin.project_id, parent_id)
            .map(|c| c.len() as i64)
            .unwrap_or(0)
    });
    bin.save(&engine.store)?;

    *state = CommandState::MoveToBin {
        previous_parent,
        previous_index,
    };
    Ok(())
}

pub(crate) fn undo_move_to_bin(
    engine: &mut Engine,
    bin_id: Uuid,
    previous_parent: Option<Uuid>,
    previous_index: i64,
) -> Result<()> {
    let mut bin = Bin::load(&engine.store, bin_id)?;
    bin.parent_id = previous_parent;
    bin.insert_index = previous_index;
    bin.save(&engine.store)
}
