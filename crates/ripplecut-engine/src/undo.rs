//! Executed-mutation ledger.
//!
//! Commands that rewrite many clips (overwrite, ripple, move, insert)
//! record a short `{type, clip_id}` list plus a map of pre-images. The
//! undoer rehydrates each mutation from that map and the current store
//! and applies the reverse stream in the opposite order; full update
//! payloads are never persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_model::{Clip, OcclusionAction, Property};
use ripplecut_store::Store;

use crate::bucket::{BulkShiftBlock, ClipInsert, ClipUpdate, MutationBucket};

/// One store mutation, as executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutedMutation {
    Update { clip_id: Uuid },
    Delete { clip_id: Uuid },
    Insert { clip_id: Uuid },
    BulkShift(BulkShiftBlock),
}

/// The replayable record of a command's clip mutations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationLedger {
    /// Pre-image of every clip this command updated or deleted.
    pub original_states: HashMap<Uuid, Clip>,
    /// Properties of deleted clips, for restore.
    pub deleted_properties: HashMap<Uuid, Vec<Property>>,
    /// Mutations in execution order.
    pub executed: Vec<ExecutedMutation>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }

    fn remember(&mut self, before: &Clip) {
        self.original_states
            .entry(before.id)
            .or_insert_with(|| before.clone());
    }

    /// Rewrite a clip row and emit the update.
    pub fn update_clip(
        &mut self,
        store: &Store,
        bucket: &mut MutationBucket,
        before: &Clip,
        after: &Clip,
    ) -> Result<()> {
        self.remember(before);
        after.save(store)?;
        self.executed.push(ExecutedMutation::Update { clip_id: after.id });
        bucket.update(after.owner_sequence_id, ClipUpdate::from_clip(after));
        Ok(())
    }

    /// Delete a clip row (with its properties snapshotted) and emit the
    /// delete.
    pub fn delete_clip(
        &mut self,
        store: &Store,
        bucket: &mut MutationBucket,
        clip: &Clip,
    ) -> Result<()> {
        self.remember(clip);
        let props = Property::load_for_clip(store, clip.id)?;
        if !props.is_empty() {
            self.deleted_properties.insert(clip.id, props);
        }
        clip.delete(store)?;
        self.executed.push(ExecutedMutation::Delete { clip_id: clip.id });
        bucket.delete(clip.owner_sequence_id, clip.id);
        Ok(())
    }

    /// Create a clip row, optionally copying properties from another clip,
    /// and emit the insert.
    pub fn insert_clip(
        &mut self,
        store: &Store,
        bucket: &mut MutationBucket,
        clip: &Clip,
        copy_properties_from: Option<Uuid>,
    ) -> Result<()> {
        clip.save(store)?;
        if let Some(source) = copy_properties_from {
            Property::copy_all(store, source, clip.id)?;
        }
        self.executed.push(ExecutedMutation::Insert { clip_id: clip.id });
        bucket.insert(
            clip.owner_sequence_id,
            ClipInsert {
                clip: clip.clone(),
                track_sequence_id: clip.owner_sequence_id,
                label: None,
            },
        );
        Ok(())
    }

    /// Apply a bulk shift and emit it. An enumerated membership moves
    /// exactly those rows; without one the start-frame predicate decides.
    pub fn bulk_shift(
        &mut self,
        store: &Store,
        bucket: &mut MutationBucket,
        sequence_id: Uuid,
        block: BulkShiftBlock,
    ) -> Result<()> {
        match &block.clip_ids {
            Some(ids) => {
                for id in ids {
                    if let Some(clip) = Clip::load_optional(store, *id)? {
                        let mut moved = clip.clone();
                        moved.timeline_start = ripplecut_core::RationalTime::from_frames(
                            clip.timeline_start.frames() + block.shift_frames,
                            clip.frame_rate,
                        );
                        moved.save(store)?;
                    }
                }
            }
            None => {
                Clip::bulk_shift(store, block.track_id, block.start_frames, block.shift_frames)?;
            }
        }
        bucket.bulk_shift(sequence_id, block.clone());
        self.executed.push(ExecutedMutation::BulkShift(block));
        Ok(())
    }

    /// Apply one occlusion-resolver action. `split_from` inserts inherit
    /// the source clip's properties.
    pub fn apply_occlusion_action(
        &mut self,
        store: &Store,
        bucket: &mut MutationBucket,
        action: &OcclusionAction,
    ) -> Result<()> {
        match action {
            OcclusionAction::Trim { before, after } => {
                self.update_clip(store, bucket, before, after)
            }
            OcclusionAction::Delete { clip } => self.delete_clip(store, bucket, clip),
            OcclusionAction::Insert { clip, split_from } => {
                self.insert_clip(store, bucket, clip, Some(*split_from))
            }
        }
    }

    /// Reverse every mutation, most recent first, emitting the inverse
    /// stream to `bucket`.
    pub fn revert(&self, store: &Store, bucket: &mut MutationBucket) -> Result<()> {
        for mutation in self.executed.iter().rev() {
            match mutation {
                ExecutedMutation::Update { clip_id } => {
                    let original = self.original_states.get(clip_id).ok_or_else(|| {
                        EngineError::UndoFailure(format!(
                            "no pre-image recorded for updated clip {}",
                            clip_id
                        ))
                    })?;
                    original.save(store)?;
                    bucket.update(original.owner_sequence_id, ClipUpdate::from_clip(original));
                }
                ExecutedMutation::Delete { clip_id } => {
                    let original = self.original_states.get(clip_id).ok_or_else(|| {
                        EngineError::UndoFailure(format!(
                            "no pre-image recorded for deleted clip {}",
                            clip_id
                        ))
                    })?;
                    original.save(store)?;
                    if let Some(props) = self.deleted_properties.get(clip_id) {
                        for prop in props {
                            prop.save(store)?;
                        }
                    }
                    bucket.insert(
                        original.owner_sequence_id,
                        ClipInsert {
                            clip: original.clone(),
                            track_sequence_id: original.owner_sequence_id,
                            label: None,
                        },
                    );
                }
                ExecutedMutation::Insert { clip_id } => {
                    if let Some(clip) = Clip::load_optional(store, *clip_id)? {
                        clip.delete(store)?;
                        bucket.delete(clip.owner_sequence_id, *clip_id);
                    } else {
                        debug!(%clip_id, "inserted clip already gone on undo");
                    }
                }
                ExecutedMutation::BulkShift(block) => {
                    let reversed = BulkShiftBlock {
                        shift_frames: -block.shift_frames,
                        start_frames: block.start_frames + block.shift_frames,
                        anchor_start_frame: block.anchor_start_frame + block.shift_frames,
                        ..block.clone()
                    };
                    if let Some(ids) = &block.clip_ids {
                        // Enumerated membership: shift exactly those rows back.
                        for id in ids {
                            if let Some(clip) = Clip::load_optional(store, *id)? {
                                let mut moved = clip.clone();
                                moved.timeline_start = ripplecut_core::RationalTime::from_frames(
                                    clip.timeline_start.frames() - block.shift_frames,
                                    clip.frame_rate,
                                );
                                moved.save(store)?;
                            }
                        }
                    } else {
                        Clip::bulk_shift(
                            store,
                            reversed.track_id,
                            reversed.start_frames,
                            reversed.shift_frames,
                        )?;
                    }
                    // The UI re-applies the negated block either way.
                    if let Some(clip) = Clip::load_optional(store, block.first_clip_id)? {
                        bucket.bulk_shift(clip.owner_sequence_id, reversed);
                    }
                }
            }
        }
        Ok(())
    }
}
