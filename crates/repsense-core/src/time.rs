//! Frame time
//!
//! Every landmark frame arrives with a host-supplied timestamp. The engine
//! never reads a wall clock, so hysteresis windows are reproducible.

use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Frame timestamp, microseconds since an arbitrary session epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FrameTime(pub i64);

impl FrameTime {
    pub const ZERO: FrameTime = FrameTime(0);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        FrameTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        FrameTime(millis * 1000)
    }

    /// From a floating-point millisecond timestamp (e.g. a video clock)
    #[inline]
    pub fn from_millis_f64(millis: f64) -> Self {
        FrameTime((millis * 1000.0) as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn since(self, earlier: FrameTime) -> Duration {
        self - earlier
    }
}

impl Add<Duration> for FrameTime {
    type Output = FrameTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        FrameTime(self.0.saturating_add(rhs.as_micros() as i64))
    }
}

impl Sub<FrameTime> for FrameTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: FrameTime) -> Self::Output {
        let diff = self.0.saturating_sub(rhs.0);
        if diff >= 0 {
            Duration::from_micros(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for FrameTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1000.0)
    }
}
