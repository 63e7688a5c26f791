//! Auction countdown — time-remaining decomposition and the polling ticker.
//!
//! DESIGN
//! ======
//! `remaining` is a pure function of two instants so callers (and tests)
//! supply `now` explicitly. The ticker in [`ticker`] is the only place that
//! reads a clock.
//!
//! The distance is decomposed by successive floor division of the
//! millisecond difference: days, then hours, minutes and seconds from each
//! remainder. Nothing is ever rounded up, so the recombined duration never
//! exceeds the true distance.

pub mod ticker;

use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;

pub use ticker::{Clock, CountdownHandle, SystemClock, spawn_countdown};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

// =============================================================================
// REMAINING DURATION
// =============================================================================

/// Remaining time until an auction closes, split into display units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RemainingDuration {
    pub days: u64,
    /// 0–23.
    pub hours: u8,
    /// 0–59.
    pub minutes: u8,
    /// 0–59.
    pub seconds: u8,
    /// `true` once the end instant has been reached. All other fields are zero.
    pub ended: bool,
}

impl RemainingDuration {
    /// The terminal value published once an auction is over.
    pub const ENDED: Self = Self { days: 0, hours: 0, minutes: 0, seconds: 0, ended: true };

    /// Decompose a non-negative millisecond distance. Sub-second remainders
    /// are discarded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_millis(distance_ms: u64) -> Self {
        let days = distance_ms / MS_PER_DAY;
        let rest = distance_ms % MS_PER_DAY;
        let hours = rest / MS_PER_HOUR;
        let rest = rest % MS_PER_HOUR;
        let minutes = rest / MS_PER_MINUTE;
        let rest = rest % MS_PER_MINUTE;
        let seconds = rest / MS_PER_SECOND;

        // Each unit is bounded by the modulus above, so the narrowing is lossless.
        Self { days, hours: hours as u8, minutes: minutes as u8, seconds: seconds as u8, ended: false }
    }

    /// Recombine the displayed units into a duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        let secs = self
            .days
            .saturating_mul(MS_PER_DAY / MS_PER_SECOND)
            .saturating_add(u64::from(self.hours) * (MS_PER_HOUR / MS_PER_SECOND))
            .saturating_add(u64::from(self.minutes) * (MS_PER_MINUTE / MS_PER_SECOND))
            .saturating_add(u64::from(self.seconds));
        Duration::from_secs(secs)
    }
}

/// Card format: `d:hh:mm:ss`, or `Ended`.
impl fmt::Display for RemainingDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ended {
            return f.write_str("Ended");
        }
        write!(f, "{}:{:02}:{:02}:{:02}", self.days, self.hours, self.minutes, self.seconds)
    }
}

// =============================================================================
// CALCULATOR
// =============================================================================

/// Time left between `now` and `end`.
///
/// Returns [`RemainingDuration::ENDED`] when `end <= now`.
#[must_use]
pub fn remaining(end: OffsetDateTime, now: OffsetDateTime) -> RemainingDuration {
    if end <= now {
        return RemainingDuration::ENDED;
    }

    let distance_ms = (end - now).whole_milliseconds();
    RemainingDuration::from_millis(u64::try_from(distance_ms).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[path = "countdown_test.rs"]
mod tests;
