use std::time::Duration;

use time::OffsetDateTime;
use time::Time;

use crate::error::CooldownError;
use crate::error::Result;

/// How long a consumed slot counts against its bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Window {
    /// The slot leaks away `period` after it was consumed.
    Rolling(Duration),
    /// The slot is held until the next of these UTC times of day.
    Static(Vec<Time>),
}

impl Window {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Window::Rolling(period) if period.is_zero() => {
                Err(CooldownError::InvalidConfig("time period must be greater than zero"))
            }
            Window::Static(times) if times.is_empty() => Err(CooldownError::InvalidConfig(
                "static cooldowns need at least one reset time",
            )),
            _ => Ok(()),
        }
    }

    /// The rolling period, if this is a rolling window.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Window::Rolling(period) => Some(*period),
            Window::Static(_) => None,
        }
    }

    /// How long a slot consumed at wall-clock `now` stays held.
    pub(crate) fn hold_for(&self, now: OffsetDateTime) -> Duration {
        match self {
            Window::Rolling(period) => *period,
            Window::Static(times) => times
                .iter()
                .map(|time| next_occurrence(now, *time))
                .min()
                .map(|reset| (reset - now).unsigned_abs())
                .unwrap_or_default(),
        }
    }
}

/// The first instant strictly after `now` whose UTC time of day is `time`.
fn next_occurrence(now: OffsetDateTime, time: Time) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    let mut candidate = now.replace_time(time);
    while candidate <= now {
        candidate += time::Duration::DAY;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::macros::time;

    use super::*;

    #[test]
    fn rejects_empty_configurations() {
        assert!(Window::Rolling(Duration::ZERO).validate().is_err());
        assert!(Window::Static(vec![]).validate().is_err());
        assert!(Window::Rolling(Duration::from_millis(1)).validate().is_ok());
    }

    #[test]
    fn rolling_holds_for_the_period() {
        let window = Window::Rolling(Duration::from_secs(5));
        assert_eq!(
            window.hold_for(datetime!(2024-01-01 12:00 UTC)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn static_picks_the_nearest_future_reset() {
        let window = Window::Static(vec![time!(9:00), time!(18:00)]);
        assert_eq!(
            window.hold_for(datetime!(2024-01-01 12:00 UTC)),
            Duration::from_secs(6 * 3600)
        );
        assert_eq!(
            window.hold_for(datetime!(2024-01-01 19:30 UTC)),
            Duration::from_secs(13 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn static_reset_at_now_rolls_to_tomorrow() {
        let window = Window::Static(vec![time!(12:00)]);
        assert_eq!(
            window.hold_for(datetime!(2024-01-01 12:00 UTC)),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    fn static_is_computed_in_utc() {
        let window = Window::Static(vec![time!(12:00)]);
        // 11:00 UTC expressed at +02:00
        assert_eq!(
            window.hold_for(datetime!(2024-01-01 13:00 +2)),
            Duration::from_secs(3600)
        );
    }
}
