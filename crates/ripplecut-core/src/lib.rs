//! RippleCut core - shared types for the edit engine
//!
//! Provides the rational time model used by every subsystem and the
//! engine-wide error type.

pub mod error;
pub mod time;

pub use error::{EngineError, Result};
pub use time::{FrameRate, RationalTime, TimeValue};
