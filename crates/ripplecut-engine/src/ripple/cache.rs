//! Clip cache for the ripple pipeline.
//!
//! Holds the working set of clips keyed by id, per-track orderings, and
//! the synthetic gap clips materialised for gap edges. Gap ids are
//! deterministic (`temp_gap_<track>_<start>_<end>`) so replay produces
//! identical plans; gap clips are never persisted.

use std::collections::HashMap;

use uuid::Uuid;

use ripplecut_core::{EngineError, FrameRate, Result};
use ripplecut_model::Clip;

use super::edge::{ClipKey, RippleClip};

/// Working set of clips for one batch ripple.
#[derive(Debug, Clone, Default)]
pub struct ClipCache {
    clips: HashMap<ClipKey, RippleClip>,
    track_order: HashMap<Uuid, Vec<ClipKey>>,
}

impl ClipCache {
    /// Build from the persisted clips of a sequence, re-expressed at the
    /// sequence rate. Rows without a track are skipped.
    pub fn build(clips: &[Clip], rate: FrameRate) -> Self {
        let mut cache = Self::default();
        for clip in clips {
            if let Some(rc) = RippleClip::from_clip(clip, rate) {
                cache.insert(rc);
            }
        }
        cache
    }

    fn insert(&mut self, clip: RippleClip) {
        let track = clip.track_id;
        self.track_order
            .entry(track)
            .or_default()
            .push(clip.key.clone());
        self.clips.insert(clip.key.clone(), clip);
        self.resort(track);
    }

    fn resort(&mut self, track: Uuid) {
        if let Some(order) = self.track_order.get_mut(&track) {
            let clips = &self.clips;
            order.sort_by_key(|k| clips.get(k).map(|c| (c.start, c.end())).unwrap_or((0, 0)));
        }
    }

    pub fn get(&self, key: &ClipKey) -> Option<&RippleClip> {
        self.clips.get(key)
    }

    pub fn require(&self, key: &ClipKey) -> Result<&RippleClip> {
        self.get(key)
            .ok_or_else(|| EngineError::EntityNotFound(format!("clip {} in ripple set", key)))
    }

    /// Every working clip, including synthetic gaps.
    pub fn clips(&self) -> impl Iterator<Item = &RippleClip> {
        self.clips.values()
    }

    /// Tracks present in the working set.
    pub fn tracks(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.track_order.keys().copied()
    }

    /// Ordered keys of a track.
    pub fn track(&self, track_id: Uuid) -> &[ClipKey] {
        self.track_order
            .get(&track_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn position(&self, key: &ClipKey) -> Option<(Uuid, usize)> {
        let clip = self.clips.get(key)?;
        let order = self.track_order.get(&clip.track_id)?;
        order
            .iter()
            .position(|k| k == key)
            .map(|i| (clip.track_id, i))
    }

    /// Previous clip on the same track, skipping synthetic gaps.
    pub fn prev_of(&self, key: &ClipKey) -> Option<&RippleClip> {
        let (track, index) = self.position(key)?;
        let order = self.track_order.get(&track)?;
        order[..index]
            .iter()
            .rev()
            .map(|k| &self.clips[k])
            .find(|c| !c.is_gap)
    }

    /// Next clip on the same track, skipping synthetic gaps.
    pub fn next_of(&self, key: &ClipKey) -> Option<&RippleClip> {
        let (track, index) = self.position(key)?;
        let order = self.track_order.get(&track)?;
        order[index + 1..]
            .iter()
            .map(|k| &self.clips[k])
            .find(|c| !c.is_gap)
    }

    /// End of the previous clip, or the timeline origin when there is
    /// none.
    pub fn prev_end(&self, key: &ClipKey) -> i64 {
        self.prev_of(key).map(|c| c.end()).unwrap_or(0)
    }

    /// Materialise the gap before or after a clip as a synthetic working
    /// clip, registering it in the caches. Re-materialising the same gap
    /// returns the existing key.
    pub fn materialize_gap(&mut self, clip_key: &ClipKey, after: bool) -> Result<ClipKey> {
        let clip = self.require(clip_key)?.clone();
        let (start, end) = if after {
            let start = clip.end();
            let end = self
                .next_of(clip_key)
                .map(|n| n.start)
                .unwrap_or(start);
            (start, end)
        } else {
            let start = self.prev_end(clip_key);
            (start, clip.start)
        };

        let key = ClipKey::Gap(format!(
            "temp_gap_{}_{}_{}",
            clip.track_id, start, end
        ));
        if self.clips.contains_key(&key) {
            return Ok(key);
        }

        let gap = RippleClip {
            key: key.clone(),
            track_id: clip.track_id,
            start,
            duration: end - start,
            source_in: 0,
            source_out: end - start,
            media_id: None,
            is_gap: true,
            gap_origin: clip.key.as_clip(),
        };
        self.insert(gap);
        Ok(key)
    }

    /// Clone the working geometry for the trim phase.
    pub fn working_copy(&self) -> HashMap<ClipKey, RippleClip> {
        self.clips.clone()
    }
}
