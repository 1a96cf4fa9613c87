//! Batch ripple planning.
//!
//! Pure planning over a working copy of the sequence's clips: gap
//! materialisation, bracket polarity, per-edge constraint intersection,
//! clamp, trim application, per-track shift seeding, gap propagation,
//! overlap-bounded retry, and ordered mutation assembly. The executor
//! applies the resulting plan inside a transaction; dry-run returns it
//! untouched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;
use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, Result};
use ripplecut_model::Clip;

use crate::bucket::BulkShiftBlock;

use super::cache::ClipCache;
use super::constraints::{edge_constraints, ConstraintInterval};
use super::edge::{ClipKey, EdgeSelector, EdgeType, TrimType};
use super::preview::{
    EdgePreview, EdgePreviewEntry, GapPreview, PlannedMutation, RipplePreview,
};

/// Bound on the overlap-violation retry loop.
pub const MAX_RIPPLE_CONSTRAINT_RETRIES: usize = 4;

/// Inputs to the planner. `media_lengths` maps clip id to its media's
/// duration in sequence-rate frames, where known.
pub struct BatchPlanInput<'a> {
    pub rate: FrameRate,
    pub clips: &'a [Clip],
    pub edges: &'a [EdgeSelector],
    pub delta_frames: i64,
    pub media_lengths: &'a HashMap<Uuid, i64>,
}

/// One absolute clip rewrite the executor will perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedUpdate {
    pub clip_id: Uuid,
    pub track_id: Uuid,
    pub start: i64,
    pub duration: i64,
    pub source_in: i64,
    pub source_out: i64,
    /// Frames of growth relative to the persisted row (orders ties).
    pub grew: i64,
}

/// The full outcome of planning one batch ripple.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRipplePlan {
    pub clamped_delta: i64,
    pub deletes: Vec<Uuid>,
    /// Ordered so applying in sequence never creates transient overlaps.
    pub updates: Vec<PlannedUpdate>,
    pub bulk_shifts: Vec<BulkShiftBlock>,
    pub earliest_ripple: i64,
    pub track_shifts: HashMap<Uuid, i64>,
    pub preview: RipplePreview,
}

impl BatchRipplePlan {
    fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.clamped_delta == 0
    }
}

struct WorkEdge {
    report_key: String,
    key: ClipKey,
    edge: EdgeType,
    trim: TrimType,
    is_gap: bool,
    will_negate: bool,
    track_id: Uuid,
    ripple_point: i64,
    interval: ConstraintInterval,
    applied: i64,
}

/// Downstream shift direction per delta frame. Derived from the Phase 6
/// seed rules: in-edges pull downstream left for a positive delta,
/// out-edges push it right; negation flips out-edges and gap edges but an
/// in-edge's direction term tracks the sign of the global delta, so clip
/// in-edges keep factor -1 either way.
fn shift_factor(edge: EdgeType, is_gap: bool, will_negate: bool) -> i64 {
    match (edge, is_gap, will_negate) {
        (EdgeType::In, false, _) => -1,
        (EdgeType::In, true, false) => -1,
        (EdgeType::In, true, true) => 1,
        (EdgeType::Out, _, false) => 1,
        (EdgeType::Out, _, true) => -1,
        _ => 0,
    }
}

enum Attempt {
    Complete(Box<BatchRipplePlan>),
    /// Overlap against a non-shifting neighbour: retry with this delta.
    Violation(i64),
}

/// Plan a batch ripple. When the proposed downstream shift would push a
/// clip into a non-shifting neighbour, the pipeline re-runs with a
/// reduced delta (the edited neighbour's geometry moves with the delta,
/// so the bound cannot be expressed as a static interval); exhausting the
/// retry budget degrades to a no-op.
pub fn plan(input: &BatchPlanInput<'_>) -> Result<BatchRipplePlan> {
    if input.edges.is_empty() {
        return Err(EngineError::MissingParameter("edges".into()));
    }

    let mut delta_req = input.delta_frames;
    for attempt in 0..=MAX_RIPPLE_CONSTRAINT_RETRIES {
        match plan_once(input, delta_req)? {
            Attempt::Complete(plan) => {
                if attempt > 0 {
                    debug!(retries = attempt, delta = plan.clamped_delta, "ripple converged");
                }
                return Ok(*plan);
            }
            Attempt::Violation(next) => {
                if next == 0 {
                    return Ok(BatchRipplePlan::noop());
                }
                delta_req = next;
            }
        }
    }
    debug!("ripple retry budget exhausted; degrading to no-op");
    Ok(BatchRipplePlan::noop())
}

fn plan_once(input: &BatchPlanInput<'_>, delta_req: i64) -> Result<Attempt> {
    let mut cache = ClipCache::build(input.clips, input.rate);

    // Gap materialisation and edge normalisation.
    let mut work: SmallVec<[WorkEdge; 4]> = SmallVec::with_capacity(input.edges.len());
    for sel in input.edges {
        let base = ClipKey::Clip(sel.clip_id);
        cache.require(&base)?;
        let (key, edge, is_gap) = match sel.edge_type {
            EdgeType::In => (base, EdgeType::In, false),
            EdgeType::Out => (base, EdgeType::Out, false),
            EdgeType::GapAfter => (cache.materialize_gap(&base, true)?, EdgeType::In, true),
            EdgeType::GapBefore => (cache.materialize_gap(&base, false)?, EdgeType::Out, true),
        };
        let clip = cache.require(&key)?;
        work.push(WorkEdge {
            report_key: sel.key(),
            track_id: clip.track_id,
            ripple_point: match edge {
                EdgeType::In => clip.start,
                _ => clip.end(),
            },
            key,
            edge,
            trim: sel.trim_type,
            is_gap,
            will_negate: false,
            interval: ConstraintInterval::unbounded(),
            applied: 0,
        });
    }

    // Lead edge and bracket polarity.
    let lead_idx = input.edges.iter().position(|e| e.lead).unwrap_or(0);
    let lead_bracket = work[lead_idx].edge.bracket();
    for e in work.iter_mut() {
        e.will_negate = e.trim != TrimType::Roll && e.edge.bracket() != lead_bracket;
    }

    // Per-edge constraints, intersected into the global interval.
    let mut global = ConstraintInterval::unbounded();
    for e in work.iter_mut() {
        let clip = cache.require(&e.key)?;
        let media_len = e
            .key
            .as_clip()
            .and_then(|id| input.media_lengths.get(&id))
            .copied();
        let applied_iv = edge_constraints(clip, e.edge, e.trim, &cache, media_len);
        e.interval = if e.will_negate {
            applied_iv.negate()
        } else {
            applied_iv
        };
        global.intersect(e.interval);
    }

    let earliest_ripple = work
        .iter()
        .map(|e| e.ripple_point)
        .min()
        .unwrap_or(0);
    let edited: HashSet<ClipKey> = work.iter().map(|e| e.key.clone()).collect();

    // Track seeds: first non-roll edge per track, in selection order.
    let mut seed_factor: HashMap<Uuid, i64> = HashMap::new();
    for e in &work {
        if e.trim != TrimType::Roll {
            seed_factor
                .entry(e.track_id)
                .or_insert_with(|| shift_factor(e.edge, e.is_gap, e.will_negate));
        }
    }
    let global_factor = work
        .iter()
        .find(|e| e.trim != TrimType::Roll)
        .map(|e| shift_factor(e.edge, e.is_gap, e.will_negate))
        .unwrap_or(0);
    let factor_for = |track: Uuid| *seed_factor.get(&track).unwrap_or(&global_factor);

    // Implied constraints from non-edited clips downstream of the earliest
    // ripple point: a static previous neighbour floors the leftward shift.
    for track in cache.tracks().collect::<Vec<_>>() {
        let k = factor_for(track);
        if k == 0 {
            continue;
        }
        for key in cache.track(track).to_vec() {
            let clip = match cache.get(&key) {
                Some(c) if !c.is_gap && !edited.contains(&key) && c.start >= earliest_ripple => {
                    c.clone()
                }
                _ => continue,
            };
            if let Some(prev) = cache.prev_of(&key) {
                let prev_static = !edited.contains(&prev.key) && prev.start < earliest_ripple;
                if prev_static {
                    let floor = prev.end() - clip.start;
                    if k > 0 {
                        global.raise_min(floor);
                    } else {
                        global.cap_max(-floor);
                    }
                }
            }
        }
    }

    // Clamp.
    if global.is_empty() {
        debug!("ripple constraint interval is empty; no-op");
        return Ok(Attempt::Complete(Box::new(BatchRipplePlan::noop())));
    }
    let delta = global.clamp(delta_req);
    if delta == 0 {
        return Ok(Attempt::Complete(Box::new(BatchRipplePlan::noop())));
    }
    let clamped = delta != input.delta_frames;

    // Apply trims to the working copy.
    let mut working = cache.working_copy();
    for e in work.iter_mut() {
        e.applied = if e.will_negate { -delta } else { delta };
        let clip = working
            .get_mut(&e.key)
            .ok_or_else(|| EngineError::InvariantViolation("edge clip vanished".into()))?;
        match (e.edge, e.trim, e.is_gap) {
            (EdgeType::In, TrimType::Ripple, is_gap) => {
                clip.duration -= e.applied;
                if !is_gap {
                    clip.source_in += e.applied;
                }
            }
            (EdgeType::In, TrimType::Roll, true) => {
                // Gap roll moves the boundary without changing duration.
                clip.start += e.applied;
            }
            (EdgeType::In, TrimType::Roll, false) => {
                clip.duration -= e.applied;
                clip.source_in += e.applied;
                clip.start += e.applied;
            }
            (EdgeType::Out, _, _) => {
                clip.duration += e.applied;
                clip.source_out = clip.source_in + clip.duration;
            }
            _ => {}
        }
    }

    // Collapsed clips are deleted; synthetic gaps may reach zero freely.
    // Two edges on one clip must not delete it twice.
    let mut deletes: Vec<Uuid> = Vec::new();
    for e in &work {
        if let Some(clip) = working.get(&e.key) {
            if !clip.is_gap && clip.duration < 1 {
                if let Some(id) = clip.key.as_clip() {
                    if !deletes.contains(&id) {
                        deletes.push(id);
                    }
                }
            }
        }
    }
    let deleted: HashSet<Uuid> = deletes.iter().copied().collect();

    // Per-track downstream shifts.
    let mut track_shifts: HashMap<Uuid, i64> = HashMap::new();
    for (track, k) in &seed_factor {
        track_shifts.insert(*track, k * delta);
    }
    let global_shift = global_factor * delta;

    // Gap propagation: the clip right of a moved gap follows the gap's
    // end edge, unless its own in-edge is in the batch.
    let mut neighbor_shift: HashMap<ClipKey, i64> = HashMap::new();
    for e in &work {
        if !e.is_gap {
            continue;
        }
        let end_disp = match (e.edge, e.trim) {
            (EdgeType::In, TrimType::Ripple) => -e.applied,
            (EdgeType::In, TrimType::Roll) => e.applied,
            (EdgeType::Out, _) => e.applied,
            _ => 0,
        };
        if end_disp == 0 {
            continue;
        }
        if let Some(next) = cache.next_of(&e.key) {
            let has_own_in_edge = work
                .iter()
                .any(|o| o.key == next.key && o.edge == EdgeType::In);
            if !has_own_in_edge {
                neighbor_shift.insert(next.key.clone(), end_disp);
            }
        }
    }
    for (key, disp) in &neighbor_shift {
        if let Some(clip) = working.get_mut(key) {
            clip.start += disp;
        }
    }

    // Downstream collection and overlap bounds.
    let any_shift = global_shift != 0 || track_shifts.values().any(|s| *s != 0);
    let mut downstream: Vec<ClipKey> = Vec::new();
    if any_shift {
        let mut keys: Vec<ClipKey> = cache
            .clips()
            .filter(|c| {
                !c.is_gap
                    && c.start >= earliest_ripple
                    && !edited.contains(&c.key)
                    && !neighbor_shift.contains_key(&c.key)
                    && c.key.as_clip().map(|id| !deleted.contains(&id)).unwrap_or(true)
            })
            .map(|c| c.key.clone())
            .collect();
        keys.sort_by_key(|k| cache.get(k).map(|c| c.start).unwrap_or(0));
        downstream = keys;

        let downstream_set: HashSet<&ClipKey> = downstream.iter().collect();
        for key in &downstream {
            let clip = cache.require(key)?;
            let shift = *track_shifts.get(&clip.track_id).unwrap_or(&global_shift);
            if shift == 0 {
                continue;
            }

            let mut floor = None;
            let mut ceiling = None;
            if let Some(prev) = cache.prev_of(key) {
                if !downstream_set.contains(&prev.key) {
                    // Post-trim geometry for edited or gap-shifted prevs.
                    let prev_end = working.get(&prev.key).map(|c| c.end()).unwrap_or(prev.end());
                    floor = Some(prev_end - clip.start);
                }
            }
            if let Some(next) = cache.next_of(key) {
                if !downstream_set.contains(&next.key) {
                    let next_start = working
                        .get(&next.key)
                        .map(|c| c.start)
                        .unwrap_or(next.start);
                    ceiling = Some(next_start - clip.end());
                }
            }

            let over_floor = floor.map(|f| f - shift).filter(|v| *v > 0);
            let over_ceiling = ceiling.map(|c| shift - c).filter(|v| *v > 0);
            if let Some(overlap) = over_floor.max(over_ceiling) {
                // The blocking neighbour's geometry moves with the delta
                // (it was trimmed or gap-shifted), so step the delta down
                // by half the overlap and re-run the pipeline.
                let step = (overlap + 1) / 2;
                let magnitude = (delta.abs() - step).max(0);
                let next = magnitude * delta.signum();
                debug!(clip = %key, overlap, next, "downstream overlap; retrying");
                return Ok(Attempt::Violation(next));
            }
        }
    }

    // Assemble updates: edited real clips plus gap-shifted neighbours,
    // each clip at most once.
    let mut update_keys: Vec<ClipKey> = Vec::new();
    for e in work.iter().filter(|e| !e.is_gap) {
        if !update_keys.contains(&e.key) {
            update_keys.push(e.key.clone());
        }
    }
    for key in neighbor_shift.keys() {
        if !update_keys.contains(key) {
            update_keys.push(key.clone());
        }
    }
    let mut updates: Vec<PlannedUpdate> = Vec::new();
    for key in update_keys {
        let id = match key.as_clip() {
            Some(id) if !deleted.contains(&id) => id,
            _ => continue,
        };
        let before = cache.require(&key)?;
        let after = working
            .get(&key)
            .ok_or_else(|| EngineError::InvariantViolation("working clip vanished".into()))?;
        if before == after {
            continue;
        }
        updates.push(PlannedUpdate {
            clip_id: id,
            track_id: after.track_id,
            start: after.start,
            duration: after.duration,
            source_in: after.source_in,
            source_out: after.source_in + after.duration,
            grew: after.duration - before.duration,
        });
    }
    // Ordered so the apply never creates transient overlaps: descending
    // start when shifting right, ascending when shifting left; growth
    // breaks ties.
    if global_shift > 0 {
        updates.sort_by(|a, b| b.start.cmp(&a.start).then(b.grew.cmp(&a.grew)));
    } else {
        updates.sort_by(|a, b| a.start.cmp(&b.start).then(b.grew.cmp(&a.grew)));
    }

    // Bulk shifts for the far-downstream regions, one block per track.
    let mut by_track: HashMap<Uuid, Vec<&ClipKey>> = HashMap::new();
    for key in &downstream {
        let clip = cache.require(key)?;
        by_track.entry(clip.track_id).or_default().push(key);
    }
    let mut bulk_shifts: Vec<BulkShiftBlock> = Vec::new();
    let mut shifted_clips: Vec<Uuid> = Vec::new();
    let mut tracks: Vec<Uuid> = by_track.keys().copied().collect();
    tracks.sort();
    for track in tracks {
        let members = &by_track[&track];
        let shift = *track_shifts.get(&track).unwrap_or(&global_shift);
        if shift == 0 || members.is_empty() {
            continue;
        }
        let first = cache.require(members[0])?;
        let ids: Vec<Uuid> = members.iter().filter_map(|k| k.as_clip()).collect();
        shifted_clips.extend(ids.iter().copied());
        bulk_shifts.push(BulkShiftBlock {
            track_id: track,
            first_clip_id: first.key.as_clip().unwrap_or(Uuid::nil()),
            anchor_start_frame: first.start,
            shift_frames: shift,
            start_frames: first.start,
            clip_ids: Some(ids),
        });
    }

    // Preview assembly.
    let materialized_gaps: Vec<GapPreview> = work
        .iter()
        .filter(|e| e.is_gap)
        .filter_map(|e| {
            let gap = cache.get(&e.key)?;
            Some(GapPreview {
                key: e.key.to_string(),
                track_id: gap.track_id,
                start: gap.start,
                duration: gap.duration,
            })
        })
        .collect();

    let mut clamped_edges: Vec<String> = Vec::new();
    if clamped {
        for e in &work {
            let pins_min = delta == global.min && e.interval.min == global.min;
            let pins_max = delta == global.max && e.interval.max == global.max;
            if pins_min || pins_max {
                clamped_edges.push(e.report_key.clone());
            }
        }
    }

    let mut edge_entries: Vec<EdgePreviewEntry> = work
        .iter()
        .map(|e| EdgePreviewEntry {
            clip: e.key.clone(),
            edge_type: e.edge,
            track_id: e.track_id,
            is_selected: true,
            is_implied: false,
            is_limiter: clamped_edges.contains(&e.report_key),
            applied_delta_frames: e.applied,
        })
        .collect();
    let edge_tracks: HashSet<Uuid> = work.iter().map(|e| e.track_id).collect();
    for block in &bulk_shifts {
        if !edge_tracks.contains(&block.track_id) {
            edge_entries.push(EdgePreviewEntry {
                clip: ClipKey::Clip(block.first_clip_id),
                edge_type: EdgeType::In,
                track_id: block.track_id,
                is_selected: false,
                is_implied: true,
                is_limiter: false,
                applied_delta_frames: block.shift_frames,
            });
        }
    }

    let mut planned: Vec<PlannedMutation> = Vec::new();
    for block in bulk_shifts.iter().filter(|b| b.shift_frames > 0) {
        planned.push(PlannedMutation::BulkShift(block.clone()));
    }
    for id in &deletes {
        planned.push(PlannedMutation::Delete { clip_id: *id });
    }
    for u in &updates {
        planned.push(PlannedMutation::Update {
            clip_id: u.clip_id,
            track_id: u.track_id,
            start: u.start,
            duration: u.duration,
            source_in: u.source_in,
            source_out: u.source_out,
        });
    }
    for block in bulk_shifts.iter().filter(|b| b.shift_frames < 0) {
        planned.push(PlannedMutation::BulkShift(block.clone()));
    }
    for gap in &materialized_gaps {
        planned.push(PlannedMutation::GapPreview(gap.clone()));
    }

    let rate = input.rate;
    let limiter_edge_keys = clamped_edges.clone();
    let preview = RipplePreview {
        planned_mutations: planned,
        affected_clips: work.iter().filter_map(|e| e.key.as_clip()).collect(),
        shifted_clips,
        shift_blocks: bulk_shifts.clone(),
        clamped_delta_frames: delta,
        clamped_delta_ms: delta as f64 * 1000.0 * rate.denominator as f64
            / rate.numerator as f64,
        materialized_gaps,
        clamped_edges,
        edge_preview: EdgePreview {
            limiter_edge_keys,
            edges: edge_entries,
        },
    };

    Ok(Attempt::Complete(Box::new(BatchRipplePlan {
        clamped_delta: delta,
        deletes,
        updates,
        bulk_shifts,
        earliest_ripple,
        track_shifts,
        preview,
    })))
}
