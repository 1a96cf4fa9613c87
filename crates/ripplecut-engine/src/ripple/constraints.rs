//! Per-edge constraint intervals.
//!
//! Every edge contributes a closed interval on the signed batch delta.
//! Constraints are first computed on the edge's *applied* delta; edges
//! whose bracket differs from the lead's (`will_negate`) have their
//! interval reflected before the global intersection.

use super::cache::ClipCache;
use super::edge::{EdgeType, RippleClip, TrimType};

/// Sentinel magnitude for an unbounded side. Far above any timeline
/// coordinate, low enough that negation cannot overflow.
pub const NO_BOUND: i64 = i64::MAX / 4;

/// Closed interval `[min, max]` of admissible deltas, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintInterval {
    pub min: i64,
    pub max: i64,
}

impl ConstraintInterval {
    pub fn unbounded() -> Self {
        Self {
            min: -NO_BOUND,
            max: NO_BOUND,
        }
    }

    pub fn raise_min(&mut self, min: i64) {
        if min > self.min {
            self.min = min;
        }
    }

    pub fn cap_max(&mut self, max: i64) {
        if max < self.max {
            self.max = max;
        }
    }

    pub fn intersect(&mut self, other: Self) {
        self.raise_min(other.min);
        self.cap_max(other.max);
    }

    /// Reflect the interval: the constraint on `-delta`.
    pub fn negate(self) -> Self {
        Self {
            min: -self.max,
            max: -self.min,
        }
    }

    pub fn is_empty(self) -> bool {
        self.min > self.max
    }

    /// Clamp a requested delta into the interval (undefined on empty).
    pub fn clamp(self, delta: i64) -> i64 {
        delta.clamp(self.min, self.max)
    }

    pub fn bounds_min(self) -> bool {
        self.min > -NO_BOUND
    }

    pub fn bounds_max(self) -> bool {
        self.max < NO_BOUND
    }
}

/// Compute the constraint interval on the *applied* delta of one
/// normalised edge (`In`/`Out` only; gap edges arrive here already
/// rewritten onto their synthetic clip).
///
/// `media_len` is the clip's media duration in sequence-rate frames, when
/// known; it bounds ripple-out against the media tail and is what turns a
/// too-large request into a clamp rather than a failure.
pub fn edge_constraints(
    clip: &RippleClip,
    edge: EdgeType,
    trim: TrimType,
    cache: &ClipCache,
    media_len: Option<i64>,
) -> ConstraintInterval {
    let mut interval = ConstraintInterval::unbounded();

    // Roll edges move within the space bounded by their neighbour.
    if trim == TrimType::Roll {
        match edge {
            EdgeType::In => {
                interval.raise_min(cache.prev_end(&clip.key) - clip.start);
            }
            EdgeType::Out => {
                if let Some(next) = cache.next_of(&clip.key) {
                    interval.cap_max(next.start - clip.end());
                }
            }
            _ => {}
        }
    }

    if clip.is_gap {
        // Gap closure: a gap can close at most by its own length.
        match edge {
            EdgeType::In => interval.cap_max(clip.duration),
            EdgeType::Out => interval.raise_min(-clip.duration),
            _ => {}
        }
        // A left-dragged gap never produces a negative origin.
        interval.raise_min(-clip.start);
    } else {
        match edge {
            EdgeType::In => {
                // Media head: source_in cannot go negative.
                interval.raise_min(-clip.source_in);
                // Minimum one frame of clip left.
                interval.cap_max(clip.duration - 1);
            }
            EdgeType::Out => {
                // Media tail: cannot ripple past the end of the media.
                if let Some(len) = media_len {
                    interval.cap_max(len - clip.source_in - clip.duration);
                }
                interval.raise_min(-(clip.duration - 1));
            }
            _ => {}
        }
    }

    interval
}
