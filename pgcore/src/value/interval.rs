use std::{cmp::Ordering, ops::Neg};

use serde::{Deserialize, Serialize};

pub(crate) const MICROS_PER_SECOND: i64 = 1_000_000;
pub(crate) const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
pub(crate) const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;
const MICROS_PER_DAY: i128 = 24 * MICROS_PER_HOUR as i128;

/// Postgres interval.
///
/// Stored the same way postgres stores it: months, days and microseconds are
/// independent fields, because neither a month nor a day has a fixed length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    months: i32,
    days: i32,
    microseconds: i64,
}

impl Interval {
    pub const ZERO: Interval = Interval { months: 0, days: 0, microseconds: 0 };

    pub const fn new(months: i32, days: i32, microseconds: i64) -> Self {
        Self { months, days, microseconds }
    }

    pub const fn months(&self) -> i32 {
        self.months
    }

    pub const fn days(&self) -> i32 {
        self.days
    }

    pub const fn microseconds(&self) -> i64 {
        self.microseconds
    }

    pub const fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.microseconds == 0
    }

    /// Length assuming 30 days per month, which is how postgres orders intervals.
    fn approx_micros(&self) -> i128 {
        (self.months as i128 * 30 + self.days as i128) * MICROS_PER_DAY
            + self.microseconds as i128
    }

    /// Postgres interval ordering.
    pub fn compare(&self, other: &Interval) -> Ordering {
        self.approx_micros().cmp(&other.approx_micros())
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Self::Output {
        Self {
            months: -self.months,
            days: -self.days,
            microseconds: -self.microseconds,
        }
    }
}

impl From<time::Duration> for Interval {
    /// Seconds only, days are never carried out of the duration.
    fn from(value: time::Duration) -> Self {
        let micros = value.whole_microseconds().clamp(i64::MIN as i128, i64::MAX as i128);
        Self { months: 0, days: 0, microseconds: micros as i64 }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn orders_by_approximate_length() {
        let month = Interval::new(1, 0, 0);
        let days = Interval::new(0, 31, 0);
        assert_eq!(month.compare(&days), Ordering::Less);
        assert_eq!(Interval::new(0, 1, 0).compare(&Interval::new(0, 0, 24 * MICROS_PER_HOUR)), Ordering::Equal);
        assert_ne!(Interval::new(0, 1, 0), Interval::new(0, 0, 24 * MICROS_PER_HOUR));
    }

    #[test]
    fn negates_every_field() {
        assert_eq!(-Interval::new(1, -2, 3), Interval::new(-1, 2, -3));
    }
}
