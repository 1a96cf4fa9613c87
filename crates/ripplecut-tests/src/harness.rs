//! Shared fixtures for the integration tests.

use uuid::Uuid;

use ripplecut_core::{FrameRate, RationalTime};
use ripplecut_engine::Engine;
use ripplecut_media::StaticProber;
use ripplecut_model::{Clip, Project, Sequence, Track, TrackKind};
use ripplecut_store::Store;

pub const RATE: FrameRate = FrameRate::FPS_30;

pub fn frames(f: i64) -> RationalTime {
    RationalTime::from_frames(f, RATE)
}

/// Engine over an in-memory store with one project, one 30fps timeline
/// sequence, and tracks V1, V2, A1.
pub struct Rig {
    pub engine: Engine,
    pub project_id: Uuid,
    pub sequence_id: Uuid,
    pub v1: Uuid,
    pub v2: Uuid,
    pub a1: Uuid,
}

/// Opt-in tracing for debugging test runs: RIPPLECUT_TEST_LOG=debug.
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if std::env::var("RIPPLECUT_TEST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_env(
                    "RIPPLECUT_TEST_LOG",
                ))
                .try_init();
        }
    });
}

impl Rig {
    pub fn new() -> Self {
        init_logging();
        let mut engine = Engine::new(Store::open_in_memory().unwrap());
        let mut prober = StaticProber::new();
        prober.insert_av("footage/interview.mp4", 3600, RATE);
        prober.insert_av("footage/broll.mp4", 1800, RATE);
        engine.set_prober(Box::new(prober));

        let project = Project::new("Integration");
        project.save(engine.store()).unwrap();
        let seq = Sequence::new(project.id, "Main", RATE, 1920, 1080);
        seq.save(engine.store()).unwrap();
        let v1 = Track::new(seq.id, TrackKind::Video, 1, 48);
        let v2 = Track::new(seq.id, TrackKind::Video, 2, 48);
        let a1 = Track::new(seq.id, TrackKind::Audio, 1, 32);
        for t in [&v1, &v2, &a1] {
            t.save(engine.store()).unwrap();
        }

        Self {
            engine,
            project_id: project.id,
            sequence_id: seq.id,
            v1: v1.id,
            v2: v2.id,
            a1: a1.id,
        }
    }

    /// Place a clip with a zero source offset.
    pub fn place(&self, track: Uuid, start: i64, dur: i64) -> Clip {
        let clip = Clip::new_timeline(
            self.project_id,
            self.sequence_id,
            track,
            format!("clip-{}", start),
            RATE,
            frames(start),
            frames(dur),
            frames(0),
        );
        clip.save(self.engine.store()).unwrap();
        clip
    }

    pub fn clip(&self, id: Uuid) -> Clip {
        Clip::load(self.engine.store(), id).unwrap()
    }

    pub fn track_clips(&self, track: Uuid) -> Vec<Clip> {
        Clip::load_for_track(self.engine.store(), track).unwrap()
    }

    /// Assert that no two clips on any track of the sequence overlap.
    pub fn assert_no_overlaps(&self) {
        let clips = Clip::load_for_sequence(self.engine.store(), self.sequence_id).unwrap();
        for a in &clips {
            for b in &clips {
                if a.id >= b.id || a.track_id != b.track_id {
                    continue;
                }
                let a_end = a.timeline_start + a.duration;
                let b_end = b.timeline_start + b.duration;
                assert!(
                    a_end <= b.timeline_start || b_end <= a.timeline_start,
                    "clips {} and {} overlap on track {:?}",
                    a.id,
                    b.id,
                    a.track_id
                );
            }
        }
    }

    /// Assert the persisted-clip invariants for the whole sequence.
    pub fn assert_clip_invariants(&self) {
        let clips = Clip::load_for_sequence(self.engine.store(), self.sequence_id).unwrap();
        for clip in &clips {
            assert!(clip.duration.frames() >= 1, "clip {} is empty", clip.id);
            assert!(
                clip.timeline_start.frames() >= 0,
                "clip {} starts before the origin",
                clip.id
            );
            assert_eq!(
                clip.source_out,
                clip.source_in + clip.duration,
                "clip {} source window is inconsistent",
                clip.id
            );
        }
    }
}
