//! Timeline mutation bucket.
//!
//! Per-command collection of update/insert/delete/bulk-shift mutations
//! targeted at sequences. Executors append; the dispatcher flushes the
//! bucket to the UI timeline cache after commit (never during dry-run).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_model::Clip;

/// Full clip payload for a newly placed clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipInsert {
    pub clip: Clip,
    /// Sequence the clip's track belongs to.
    pub track_sequence_id: Uuid,
    pub label: Option<String>,
}

/// Geometry/flags update for an existing clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipUpdate {
    pub clip_id: Uuid,
    pub track_id: Uuid,
    pub track_sequence_id: Uuid,
    pub start_value: i64,
    pub duration: i64,
    pub source_in: i64,
    pub source_out: i64,
    pub enabled: bool,
}

impl ClipUpdate {
    /// Build an update record from a clip row.
    pub fn from_clip(clip: &Clip) -> Self {
        Self {
            clip_id: clip.id,
            track_id: clip.track_id.unwrap_or(Uuid::nil()),
            track_sequence_id: clip.owner_sequence_id,
            start_value: clip.timeline_start.frames(),
            duration: clip.duration.frames(),
            source_in: clip.source_in.frames(),
            source_out: clip.source_out.frames(),
            enabled: clip.enabled,
        }
    }
}

/// Compact "move every clip at or past X by N frames" mutation. The UI
/// applies it without enumerating each clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkShiftBlock {
    pub track_id: Uuid,
    /// First (earliest) clip covered by the shift.
    pub first_clip_id: Uuid,
    /// That clip's start before the shift.
    pub anchor_start_frame: i64,
    pub shift_frames: i64,
    /// Clips whose `timeline_start.frames >= start_frames` move.
    pub start_frames: i64,
    /// Explicit member list, when the planner enumerated one.
    pub clip_ids: Option<Vec<Uuid>>,
}

/// Sequence-level notification (created/renamed/playhead and friends).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub action: String,
    pub sequence_id: Uuid,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

/// Mutation streams for one sequence, in emission order per stream.
#[derive(Debug, Clone, Default)]
pub struct SequenceBucket {
    pub inserts: Vec<ClipInsert>,
    pub updates: Vec<ClipUpdate>,
    pub deletes: Vec<Uuid>,
    pub bulk_shifts: Vec<BulkShiftBlock>,
    pub sequence_meta: Vec<SequenceMeta>,
}

impl SequenceBucket {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.bulk_shifts.is_empty()
            && self.sequence_meta.is_empty()
    }
}

/// Per-command mutation bucket, keyed by sequence id.
#[derive(Debug, Clone, Default)]
pub struct MutationBucket {
    by_sequence: HashMap<Uuid, SequenceBucket>,
}

impl MutationBucket {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, sequence_id: Uuid) -> &mut SequenceBucket {
        self.by_sequence.entry(sequence_id).or_default()
    }

    pub fn insert(&mut self, sequence_id: Uuid, record: ClipInsert) {
        self.entry(sequence_id).inserts.push(record);
    }

    pub fn update(&mut self, sequence_id: Uuid, record: ClipUpdate) {
        self.entry(sequence_id).updates.push(record);
    }

    pub fn delete(&mut self, sequence_id: Uuid, clip_id: Uuid) {
        self.entry(sequence_id).deletes.push(clip_id);
    }

    pub fn bulk_shift(&mut self, sequence_id: Uuid, block: BulkShiftBlock) {
        self.entry(sequence_id).bulk_shifts.push(block);
    }

    pub fn sequence_meta(&mut self, sequence_id: Uuid, action: &str, detail: serde_json::Value) {
        self.entry(sequence_id).sequence_meta.push(SequenceMeta {
            action: action.into(),
            sequence_id,
            detail,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.by_sequence.values().all(|b| b.is_empty())
    }

    /// Drain every per-sequence bucket for the flush step.
    pub fn drain(&mut self) -> Vec<(Uuid, SequenceBucket)> {
        self.by_sequence.drain().collect()
    }

    /// Discard everything (rollback path).
    pub fn clear(&mut self) {
        self.by_sequence.clear();
    }

    /// Read-only view for assertions.
    pub fn for_sequence(&self, sequence_id: Uuid) -> Option<&SequenceBucket> {
        self.by_sequence.get(&sequence_id)
    }
}
