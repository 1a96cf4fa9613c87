//! Media file probing contract.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use ripplecut_core::{EngineError, FrameRate, RationalTime, Result};

/// Information about a probed media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbedMedia {
    /// File path
    pub path: String,
    /// Authoritative duration
    pub duration: RationalTime,
    /// Video streams
    pub video_streams: Vec<VideoStreamInfo>,
    /// Audio streams
    pub audio_streams: Vec<AudioStreamInfo>,
}

/// Information about a video stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
}

/// Information about an audio stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

impl ProbedMedia {
    /// Check if the file has video.
    pub fn has_video(&self) -> bool {
        !self.video_streams.is_empty()
    }

    /// Check if the file has audio.
    pub fn has_audio(&self) -> bool {
        !self.audio_streams.is_empty()
    }

    /// Get the primary video stream info.
    pub fn primary_video(&self) -> Option<&VideoStreamInfo> {
        self.video_streams.first()
    }

    /// Get the primary audio stream info.
    pub fn primary_audio(&self) -> Option<&AudioStreamInfo> {
        self.audio_streams.first()
    }

    /// The rate timeline math should use for this media: the primary video
    /// rate, falling back to the probe duration's own rate.
    pub fn timeline_rate(&self) -> FrameRate {
        self.primary_video()
            .map(|v| v.frame_rate)
            .unwrap_or_else(|| self.duration.rate())
    }
}

/// Probe collaborator. Invoked synchronously; may block.
pub trait MediaProber {
    fn probe(&self, path: &Path) -> Result<ProbedMedia>;
}

/// Deterministic prober backed by a fixed path table. Unknown paths fail
/// with `EntityNotFound`, mirroring a missing file.
#[derive(Debug, Default)]
pub struct StaticProber {
    table: HashMap<String, ProbedMedia>,
}

impl StaticProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe result for a path.
    pub fn insert(&mut self, media: ProbedMedia) {
        self.table.insert(media.path.clone(), media);
    }

    /// Convenience: register a video+audio file of `duration_frames` at
    /// `rate` with one stereo audio stream.
    pub fn insert_av(&mut self, path: &str, duration_frames: i64, rate: FrameRate) {
        self.insert(ProbedMedia {
            path: path.into(),
            duration: RationalTime::from_frames(duration_frames, rate),
            video_streams: vec![VideoStreamInfo {
                index: 0,
                width: 1920,
                height: 1080,
                frame_rate: rate,
            }],
            audio_streams: vec![AudioStreamInfo {
                index: 1,
                sample_rate: 48000,
                channels: 2,
            }],
        });
    }
}

impl MediaProber for StaticProber {
    fn probe(&self, path: &Path) -> Result<ProbedMedia> {
        let key = path.to_string_lossy();
        self.table
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| EngineError::EntityNotFound(format!("media file {}", key)))
    }
}
