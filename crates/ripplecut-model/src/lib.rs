//! RippleCut entity model
//!
//! Value types for the persisted clip graph: projects, sequences, tracks,
//! clips, media, properties, and bins. Each entity knows how to load, save,
//! and delete itself through the store gateway, and exposes a snapshot used
//! by command undoers. The occlusion resolver keeps clips on a track
//! non-overlapping.

pub mod bin;
pub mod clip;
pub mod media;
pub mod occlusion;
pub mod project;
pub mod property;
pub mod sequence;
pub mod track;

pub use bin::Bin;
pub use clip::{Clip, ClipKind};
pub use media::Media;
pub use occlusion::{resolve as resolve_occlusions, OcclusionAction, OcclusionTarget, PendingPlacement};
pub use project::Project;
pub use property::Property;
pub use sequence::{Sequence, SequenceKind};
pub use track::{Track, TrackKind};

use ripplecut_core::{EngineError, Result};
use uuid::Uuid;

/// Parse a stored id column back into a [`Uuid`].
pub(crate) fn parse_uuid(text: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| EngineError::Store(format!("malformed {} id: {}", what, text)))
}
