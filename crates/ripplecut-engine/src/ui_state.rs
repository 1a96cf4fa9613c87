//! UI timeline state cache.
//!
//! Caches clips, selection, playhead, and the snapping flag per sequence.
//! Executors never write here directly; the dispatcher flushes the
//! mutation bucket into this cache after commit, preserving per-sequence
//! emission order.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use ripplecut_core::RationalTime;
use ripplecut_model::Clip;

use crate::bucket::{MutationBucket, SequenceBucket};
use crate::ripple::EdgeSelector;

/// A selected gap on a track, identified by the clip it neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapSelector {
    pub track_id: Uuid,
    pub after_clip_id: Uuid,
}

/// Cached timeline state for the UI.
#[derive(Debug, Default)]
pub struct TimelineState {
    /// Sequence currently open in the timeline panel.
    pub active_sequence: Option<Uuid>,
    clips: HashMap<Uuid, HashMap<Uuid, Clip>>,
    pub selected_clips: HashSet<Uuid>,
    pub selected_edges: Vec<EdgeSelector>,
    pub selected_gaps: Vec<GapSelector>,
    playhead: HashMap<Uuid, RationalTime>,
    pub snapping: bool,
}

impl TimelineState {
    pub fn new() -> Self {
        Self {
            snapping: true,
            ..Self::default()
        }
    }

    /// Replace the clip cache for a sequence (initial open / reload).
    pub fn prime(&mut self, sequence_id: Uuid, clips: Vec<Clip>) {
        let map = clips.into_iter().map(|c| (c.id, c)).collect();
        self.clips.insert(sequence_id, map);
    }

    /// Whether this cache currently reflects `sequence_id`.
    pub fn reflects(&self, sequence_id: Uuid) -> bool {
        self.active_sequence == Some(sequence_id) && self.clips.contains_key(&sequence_id)
    }

    /// Cached clips of a sequence, unsorted.
    pub fn clips_for(&self, sequence_id: Uuid) -> Option<Vec<Clip>> {
        self.clips
            .get(&sequence_id)
            .map(|m| m.values().cloned().collect())
    }

    /// One cached clip.
    pub fn clip(&self, sequence_id: Uuid, clip_id: Uuid) -> Option<&Clip> {
        self.clips.get(&sequence_id)?.get(&clip_id)
    }

    pub fn playhead(&self, sequence_id: Uuid) -> Option<RationalTime> {
        self.playhead.get(&sequence_id).copied()
    }

    pub fn set_playhead(&mut self, sequence_id: Uuid, at: RationalTime) {
        self.playhead.insert(sequence_id, at);
    }

    /// Drop clip, gap, and edge selection (structural edits invalidate it).
    pub fn clear_edit_selection(&mut self) {
        self.selected_clips.clear();
        self.selected_edges.clear();
        self.selected_gaps.clear();
    }

    /// Apply one flushed sequence bucket to the cache.
    fn apply_sequence(&mut self, sequence_id: Uuid, streams: &SequenceBucket) {
        let cache = self.clips.entry(sequence_id).or_default();
        for block in &streams.bulk_shifts {
            for clip in cache.values_mut() {
                let member = match &block.clip_ids {
                    Some(ids) => ids.contains(&clip.id),
                    None => {
                        clip.track_id == Some(block.track_id)
                            && clip.timeline_start.frames() >= block.start_frames
                    }
                };
                if member {
                    clip.timeline_start = RationalTime::from_frames(
                        clip.timeline_start.frames() + block.shift_frames,
                        clip.frame_rate,
                    );
                }
            }
        }
        for insert in &streams.inserts {
            cache.insert(insert.clip.id, insert.clip.clone());
        }
        for update in &streams.updates {
            if let Some(clip) = cache.get_mut(&update.clip_id) {
                let rate = clip.frame_rate;
                clip.track_id = Some(update.track_id);
                clip.timeline_start = RationalTime::from_frames(update.start_value, rate);
                clip.duration = RationalTime::from_frames(update.duration, rate);
                clip.source_in = RationalTime::from_frames(update.source_in, rate);
                clip.source_out = RationalTime::from_frames(update.source_out, rate);
                clip.enabled = update.enabled;
            }
        }
        for clip_id in &streams.deletes {
            cache.remove(clip_id);
            self.selected_clips.remove(clip_id);
        }
    }

    /// Flush a committed command's bucket into the cache.
    pub fn apply(&mut self, bucket: &mut MutationBucket) {
        for (sequence_id, streams) in bucket.drain() {
            self.apply_sequence(sequence_id, &streams);
        }
    }
}
