//! Occlusion resolver.
//!
//! Given a target span on a track and the set of *pending* clip positions
//! (clips that will move even though the store still holds their old
//! rows), plans the trims, deletes, and inserts required so that no two
//! persisted clips overlap. Pure: the resolver never touches the store;
//! callers apply the returned actions in order and emit them to the
//! command's mutation bucket.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use ripplecut_core::RationalTime;

use crate::clip::Clip;

/// The span a clip is about to occupy.
#[derive(Debug, Clone)]
pub struct OcclusionTarget {
    pub track_id: Uuid,
    pub timeline_start: RationalTime,
    pub duration: RationalTime,
    /// Skipped while scanning (the clip being saved).
    pub exclude_clip_id: Option<Uuid>,
}

/// A position a clip is known to be moving to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PendingPlacement {
    pub start: RationalTime,
    pub duration: RationalTime,
    /// Overlap slack in frames: contact up to this many frames is not
    /// treated as an occlusion.
    pub tolerance: i64,
}

/// One planned store mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OcclusionAction {
    /// Rewrite a surviving clip. `before` is the persisted row (for undo),
    /// `after` the row to write.
    Trim { before: Clip, after: Clip },
    /// Remove a fully covered clip.
    Delete { clip: Clip },
    /// Create the second surviving piece of a spanning clip. Inherits the
    /// original clip's properties; `split_from` names the source.
    Insert { clip: Clip, split_from: Uuid },
}

/// Plan the actions that clear `target` on its track. `track_clips` are
/// the persisted clips of the track; `pending` overlays known moves.
pub fn resolve(
    track_clips: &[Clip],
    target: &OcclusionTarget,
    pending: &HashMap<Uuid, PendingPlacement>,
) -> Vec<OcclusionAction> {
    let t_start = target.timeline_start;
    let t_end = target.timeline_start + target.duration;

    let mut actions: SmallVec<[OcclusionAction; 4]> = SmallVec::new();

    for persisted in track_clips {
        if target.exclude_clip_id == Some(persisted.id) {
            continue;
        }

        // Effective position: the pending overlay wins over the store.
        let (eff, tolerance) = match pending.get(&persisted.id) {
            Some(p) => {
                let mut eff = persisted.clone();
                eff.timeline_start = p.start.rescale(eff.frame_rate);
                eff.duration = p.duration.rescale(eff.frame_rate);
                eff.source_out = eff.source_in + eff.duration;
                (eff, p.tolerance)
            }
            None => (persisted.clone(), 0),
        };

        let e_start = eff.timeline_start;
        let e_end = eff.end();

        let overlap_start = e_start.max(t_start);
        let overlap_end = e_end.min(t_end);
        let overlap = overlap_end - overlap_start;
        if overlap.frames() <= tolerance {
            continue;
        }

        if e_start >= t_start && e_end <= t_end {
            // Entirely covered.
            actions.push(OcclusionAction::Delete {
                clip: persisted.clone(),
            });
        } else if e_start < t_start && e_end > t_end {
            // Spans the target: keep a head piece and a fresh tail piece.
            let mut head = eff.clone();
            head.duration = t_start - e_start;
            head.source_out = head.source_in + head.duration;

            let mut tail = eff.clone();
            tail.id = Uuid::new_v4();
            tail.timeline_start = t_end;
            tail.duration = e_end - t_end;
            tail.source_in = eff.source_in + (t_end - e_start);
            tail.source_out = tail.source_in + tail.duration;

            actions.push(OcclusionAction::Trim {
                before: persisted.clone(),
                after: head,
            });
            actions.push(OcclusionAction::Insert {
                clip: tail,
                split_from: persisted.id,
            });
        } else if e_start < t_start {
            // Overlaps from the left: end at the target start.
            let mut after = eff.clone();
            after.duration = t_start - e_start;
            after.source_out = after.source_in + after.duration;
            actions.push(OcclusionAction::Trim {
                before: persisted.clone(),
                after,
            });
        } else {
            // Overlaps from the right: start at the target end, duration
            // reduced from the front.
            let trimmed = t_end - e_start;
            let mut after = eff.clone();
            after.timeline_start = t_end;
            after.duration = e_end - t_end;
            after.source_in = eff.source_in + trimmed;
            after.source_out = after.source_in + after.duration;
            actions.push(OcclusionAction::Trim {
                before: persisted.clone(),
                after,
            });
        }
    }

    actions.into_vec()
}
