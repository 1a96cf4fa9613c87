//! Ripple engine.
//!
//! Batch ripple trim: a set of selected edges (real clip edges or
//! synthetic gap edges) is resolved to one clamped delta honouring every
//! per-edge and cross-track constraint; the affected edges are trimmed and
//! downstream clips on all affected tracks shift to keep multi-track sync.
//! The single-edge trim and extend-to-playhead commands are thin layers
//! over the same pipeline.

pub mod batch;
pub mod cache;
pub mod constraints;
pub mod edge;
pub mod preview;

pub use batch::{plan, BatchPlanInput, BatchRipplePlan, MAX_RIPPLE_CONSTRAINT_RETRIES};
pub use cache::ClipCache;
pub use constraints::ConstraintInterval;
pub use edge::{ClipKey, EdgeSelector, EdgeType, RippleClip, TrimType};
pub use preview::{EdgePreview, EdgePreviewEntry, GapPreview, PlannedMutation, RipplePreview};
