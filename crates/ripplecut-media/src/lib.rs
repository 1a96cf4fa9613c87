//! RippleCut media - probe contract
//!
//! The engine never decodes media; it consumes a probe result (duration
//! and stream layout) through the [`MediaProber`] trait. Deployments plug
//! in a real prober; tests use [`StaticProber`].

pub mod probe;

pub use probe::{AudioStreamInfo, MediaProber, ProbedMedia, StaticProber, VideoStreamInfo};
