//! Time representation for frame- and sample-accurate editing
//!
//! Every time value inside the engine is a frame count at an explicit
//! rational frame rate. Rational arithmetic avoids floating-point
//! accumulation errors; bare numbers are only accepted at the boundary,
//! together with a rate context, via [`TimeValue::hydrate`].

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Neg, Sub};

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate. Both terms must be at least 1.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Nominal (integer) fps - rounds up for fractional rates.
    #[inline]
    pub fn nominal_fps(self) -> u32 {
        self.numerator.div_ceil(self.denominator)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// Serialized form: `{frames, num, den}`.
#[derive(Serialize, Deserialize)]
struct RawTime {
    frames: i64,
    num: u32,
    den: u32,
}

/// A point in time (or a span) expressed as a frame count at a rational
/// frame rate.
///
/// Equality and ordering compare the underlying instants via
/// cross-multiplication, so `120 @ 30/1 == 240 @ 60/1`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "RawTime", into = "RawTime")]
pub struct RationalTime {
    frames: i64,
    rate: FrameRate,
}

impl From<RawTime> for RationalTime {
    fn from(raw: RawTime) -> Self {
        Self::new(raw.frames, raw.num.max(1), raw.den.max(1))
    }
}

impl From<RationalTime> for RawTime {
    fn from(t: RationalTime) -> Self {
        Self {
            frames: t.frames,
            num: t.rate.numerator,
            den: t.rate.denominator,
        }
    }
}

/// Division with rounding half away from zero. `d` must be positive.
fn div_round(n: i128, d: i128) -> i128 {
    if n >= 0 {
        (2 * n + d) / (2 * d)
    } else {
        -((-2 * n + d) / (2 * d))
    }
}

/// Round to the nearest integer, ties to even (banker's rounding).
fn round_half_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    match diff.partial_cmp(&0.5) {
        Some(Ordering::Less) => floor as i64,
        Some(Ordering::Greater) => floor as i64 + 1,
        _ => {
            let f = floor as i64;
            if f % 2 == 0 {
                f
            } else {
                f + 1
            }
        }
    }
}

impl RationalTime {
    /// Create a time of `frames` frames at the rate `num/den`.
    #[inline]
    pub fn new(frames: i64, num: u32, den: u32) -> Self {
        debug_assert!(num >= 1 && den >= 1, "frame rate terms must be >= 1");
        Self {
            frames,
            rate: FrameRate::new(num, den),
        }
    }

    /// Create a time of `frames` frames at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self { frames, rate }
    }

    /// Zero frames at `rate`.
    #[inline]
    pub fn zero(rate: FrameRate) -> Self {
        Self { frames: 0, rate }
    }

    /// Create from seconds, rounding half-even to the nearest frame.
    pub fn from_seconds(seconds: f64, rate: FrameRate) -> Self {
        Self {
            frames: round_half_even(seconds * rate.to_fps_f64()),
            rate,
        }
    }

    /// Create from milliseconds, rounding half-even to the nearest frame.
    pub fn from_ms(ms: f64, rate: FrameRate) -> Self {
        Self::from_seconds(ms / 1000.0, rate)
    }

    /// Convert to milliseconds (lossy).
    #[inline]
    pub fn to_ms(self) -> f64 {
        self.frames as f64 * 1000.0 * self.rate.denominator as f64
            / self.rate.numerator as f64
    }

    /// Convert to a sample count at `sample_rate` Hz.
    pub fn to_samples(self, sample_rate: u32) -> i64 {
        let n = self.frames as i128
            * self.rate.denominator as i128
            * sample_rate as i128;
        div_round(n, self.rate.numerator as i128) as i64
    }

    /// The frame count at this time's own rate.
    #[inline]
    pub fn frames(self) -> i64 {
        self.frames
    }

    /// The frame rate of this time value.
    #[inline]
    pub fn rate(self) -> FrameRate {
        self.rate
    }

    /// The instant as an exact rational number of seconds.
    #[inline]
    fn seconds(self) -> Rational64 {
        Rational64::new(
            self.frames * self.rate.denominator as i64,
            self.rate.numerator as i64,
        )
    }

    /// Re-express this time at another rate, rounding to the nearest frame.
    pub fn rescale(self, rate: FrameRate) -> Self {
        if self.rate == rate {
            return self;
        }
        let n = self.frames as i128
            * rate.numerator as i128
            * self.rate.denominator as i128;
        let d = self.rate.numerator as i128 * rate.denominator as i128;
        Self {
            frames: div_round(n, d) as i64,
            rate,
        }
    }

    /// Check if this time is zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.frames == 0
    }

    /// Absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        Self {
            frames: self.frames.abs(),
            rate: self.rate,
        }
    }

    /// Minimum of two times.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Maximum of two times.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Bring `other` to a common rate with `self` for exact frame
    /// arithmetic. The side with the smaller rate denominator is rescaled
    /// into the other's rate (so integer rates fold into fractional ones
    /// without losing the 1001 term).
    fn aligned(self, other: Self) -> (i64, i64, FrameRate) {
        if self.rate == other.rate {
            (self.frames, other.frames, self.rate)
        } else if self.rate.denominator < other.rate.denominator {
            let lhs = self.rescale(other.rate);
            (lhs.frames, other.frames, other.rate)
        } else {
            let rhs = other.rescale(self.rate);
            (self.frames, rhs.frames, self.rate)
        }
    }

    /// Format as non-drop timecode HH:MM:SS:FF at this time's rate.
    pub fn to_timecode(self) -> String {
        let fps = self.rate.nominal_fps() as u64;
        let total = self.frames.unsigned_abs();
        let frames = total % fps;
        let total_secs = total / fps;
        let seconds = total_secs % 60;
        let total_mins = total_secs / 60;
        let minutes = total_mins % 60;
        let hours = total_mins / 60;

        if self.frames < 0 {
            format!("-{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frames)
        } else {
            format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frames)
        }
    }
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        self.seconds() == other.seconds()
    }
}

impl Eq for RationalTime {}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds().cmp(&other.seconds())
    }
}

impl Hash for RationalTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Rational64 reduces on construction, so equal instants hash equal.
        let s = self.seconds();
        s.numer().hash(state);
        s.denom().hash(state);
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let (a, b, rate) = self.aligned(rhs);
        Self {
            frames: a + b,
            rate,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let (a, b, rate) = self.aligned(rhs);
        Self {
            frames: a - b,
            rate,
        }
    }
}

impl Neg for RationalTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            frames: -self.frames,
            rate: self.rate,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{}",
            self.frames, self.rate.numerator, self.rate.denominator
        )
    }
}

/// A time value as it arrives from an external surface: either a full
/// rational time or a bare frame count that only makes sense together with
/// a rate context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// `{frames, num, den}`
    Time(RationalTime),
    /// Bare number, interpreted as frames at the context rate.
    Frames(i64),
}

impl TimeValue {
    /// Resolve to a [`RationalTime`], interpreting bare numbers as frames
    /// at `default_rate` and rescaling explicit times into it.
    pub fn hydrate(self, default_rate: FrameRate) -> RationalTime {
        match self {
            TimeValue::Time(t) => t.rescale(default_rate),
            TimeValue::Frames(frames) => RationalTime::from_frames(frames, default_rate),
        }
    }
}

impl From<RationalTime> for TimeValue {
    fn from(t: RationalTime) -> Self {
        TimeValue::Time(t)
    }
}

impl From<i64> for TimeValue {
    fn from(frames: i64) -> Self {
        TimeValue::Frames(frames)
    }
}
