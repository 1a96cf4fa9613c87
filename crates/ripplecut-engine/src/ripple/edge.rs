//! Edge selectors and the working clip representation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::FrameRate;
use ripplecut_model::Clip;

/// Which boundary of a clip (or of the gap next to it) is being trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    In,
    Out,
    GapBefore,
    GapAfter,
}

impl EdgeType {
    /// Directional bracket of a normalised edge: `[` for an in-point,
    /// `]` for an out-point. Gap edges are normalised before polarity is
    /// computed.
    pub fn bracket(self) -> char {
        match self {
            EdgeType::In | EdgeType::GapAfter => '[',
            EdgeType::Out | EdgeType::GapBefore => ']',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::In => "in",
            EdgeType::Out => "out",
            EdgeType::GapBefore => "gap_before",
            EdgeType::GapAfter => "gap_after",
        }
    }
}

/// Trim mode for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimType {
    /// Trim the edge and shift downstream clips to absorb the change.
    Ripple,
    /// Move the edge within the available space; no downstream shift.
    Roll,
}

impl Default for TrimType {
    fn default() -> Self {
        TrimType::Ripple
    }
}

/// One selected edge, as submitted by the UI or a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSelector {
    pub clip_id: Uuid,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub track_id: Option<Uuid>,
    #[serde(default)]
    pub trim_type: TrimType,
    /// The edge the caller marked as driving the batch.
    #[serde(default)]
    pub lead: bool,
}

impl EdgeSelector {
    pub fn new(clip_id: Uuid, edge_type: EdgeType, trim_type: TrimType) -> Self {
        Self {
            clip_id,
            edge_type,
            track_id: None,
            trim_type,
            lead: false,
        }
    }

    /// Stable key for limiter/clamp reporting: `<clip>:<edge>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.clip_id, self.edge_type.as_str())
    }
}

/// Identity of a working clip: a persisted row or a synthetic gap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClipKey {
    Clip(Uuid),
    Gap(String),
}

impl ClipKey {
    pub fn as_clip(&self) -> Option<Uuid> {
        match self {
            ClipKey::Clip(id) => Some(*id),
            ClipKey::Gap(_) => None,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, ClipKey::Gap(_))
    }
}

impl fmt::Display for ClipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipKey::Clip(id) => write!(f, "{}", id),
            ClipKey::Gap(key) => write!(f, "{}", key),
        }
    }
}

/// Working representation of a clip (or synthetic gap) inside the ripple
/// pipeline. All values are frames at the owning sequence's rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleClip {
    pub key: ClipKey,
    pub track_id: Uuid,
    pub start: i64,
    pub duration: i64,
    pub source_in: i64,
    pub source_out: i64,
    pub media_id: Option<Uuid>,
    pub is_gap: bool,
    /// For a synthetic gap: the clip whose gap edge was selected.
    pub gap_origin: Option<Uuid>,
}

impl RippleClip {
    /// Build from a persisted clip, re-expressed at the sequence rate.
    /// Returns `None` for rows not placed on a track.
    pub fn from_clip(clip: &Clip, rate: FrameRate) -> Option<Self> {
        let track_id = clip.track_id?;
        Some(Self {
            key: ClipKey::Clip(clip.id),
            track_id,
            start: clip.timeline_start.rescale(rate).frames(),
            duration: clip.duration.rescale(rate).frames(),
            source_in: clip.source_in.rescale(rate).frames(),
            source_out: clip.source_out.rescale(rate).frames(),
            media_id: clip.media_id,
            is_gap: false,
            gap_origin: None,
        })
    }

    /// End of the interval (exclusive), in frames.
    #[inline]
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_polarity() {
        assert_eq!(EdgeType::In.bracket(), '[');
        assert_eq!(EdgeType::GapAfter.bracket(), '[');
        assert_eq!(EdgeType::Out.bracket(), ']');
        assert_eq!(EdgeType::GapBefore.bracket(), ']');
    }

    #[test]
    fn test_edge_selector_serde_names() {
        let json = r#"{"clip_id":"67e55044-10b1-426f-9247-bb680e5fe0c8",
                       "edge_type":"gap_after","trim_type":"ripple"}"#;
        let edge: EdgeSelector = serde_json::from_str(json).unwrap();
        assert_eq!(edge.edge_type, EdgeType::GapAfter);
        assert_eq!(edge.trim_type, TrimType::Ripple);
        assert!(!edge.lead);
    }

    #[test]
    fn test_clip_key_untagged_serde() {
        let clip = ClipKey::Clip(Uuid::nil());
        let gap = ClipKey::Gap("temp_gap_t_0_50".into());
        let clip_json = serde_json::to_string(&clip).unwrap();
        let gap_json = serde_json::to_string(&gap).unwrap();
        assert_eq!(serde_json::from_str::<ClipKey>(&clip_json).unwrap(), clip);
        assert_eq!(serde_json::from_str::<ClipKey>(&gap_json).unwrap(), gap);
    }
}
