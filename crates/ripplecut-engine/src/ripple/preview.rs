//! Dry-run preview types.
//!
//! A dry-run batch ripple returns the full plan without touching the
//! store or the mutation bucket; the UI renders trim previews, implied
//! edges, and limiter highlights from it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bucket::BulkShiftBlock;

use super::edge::{ClipKey, EdgeType};

/// One planned clip mutation, in apply order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannedMutation {
    Update {
        clip_id: Uuid,
        track_id: Uuid,
        start: i64,
        duration: i64,
        source_in: i64,
        source_out: i64,
    },
    Delete {
        clip_id: Uuid,
    },
    BulkShift(BulkShiftBlock),
    /// Synthetic gap geometry, emitted in dry-run only.
    GapPreview(GapPreview),
}

/// Geometry of a materialised gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapPreview {
    pub key: String,
    pub track_id: Uuid,
    pub start: i64,
    pub duration: i64,
}

/// One edge the UI should render during a trim drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePreviewEntry {
    pub clip: ClipKey,
    pub edge_type: EdgeType,
    pub track_id: Uuid,
    pub is_selected: bool,
    pub is_implied: bool,
    pub is_limiter: bool,
    pub applied_delta_frames: i64,
}

/// Edge rendering information for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePreview {
    /// Keys (`<clip>:<edge>`) of the edges that pin the clamp.
    pub limiter_edge_keys: Vec<String>,
    pub edges: Vec<EdgePreviewEntry>,
}

/// Everything a dry-run returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RipplePreview {
    pub planned_mutations: Vec<PlannedMutation>,
    /// Clips whose edges were trimmed.
    pub affected_clips: Vec<Uuid>,
    /// Clips moved by the downstream shift (bulk-shifted members).
    pub shifted_clips: Vec<Uuid>,
    pub shift_blocks: Vec<BulkShiftBlock>,
    pub clamped_delta_frames: i64,
    pub clamped_delta_ms: f64,
    pub materialized_gaps: Vec<GapPreview>,
    /// Keys (`<clip>:<edge>`) of the selected edges that hit a bound.
    pub clamped_edges: Vec<String>,
    pub edge_preview: EdgePreview,
}

impl RipplePreview {
    /// Preview of a no-op (empty interval or zero delta).
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.planned_mutations.is_empty() && self.shift_blocks.is_empty()
    }
}
