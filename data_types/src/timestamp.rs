//! Millisecond-precision instants.

use std::fmt::Display;
use std::ops::{Add, Sub};

/// An instant in time, in integer milliseconds since the UNIX epoch.
///
/// Chunks and index buckets are addressed at millisecond precision;
/// arithmetic on a [`Time`] is plain integer math on milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i64);

impl Time {
    /// The latest representable instant, used as an open upper bound when
    /// dispatching time ranges.
    pub const MAX: Self = Self(i64::MAX);

    /// Construct from milliseconds since the UNIX epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Construct from whole seconds since the UNIX epoch.
    pub const fn from_unix(secs: i64) -> Self {
        Self(secs * 1000)
    }

    /// Milliseconds since the UNIX epoch.
    pub fn millis(&self) -> i64 {
        self.0
    }

    /// Whole seconds since the UNIX epoch, truncated towards zero.
    pub fn unix(&self) -> i64 {
        self.0 / 1000
    }
}

impl Add<i64> for Time {
    type Output = Self;

    /// Shift this instant forwards by `rhs` milliseconds.
    fn add(self, rhs: i64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<i64> for Time {
    type Output = Self;

    /// Shift this instant backwards by `rhs` milliseconds.
    fn sub(self, rhs: i64) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
