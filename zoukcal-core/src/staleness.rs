//! Retiring records whose every date is in the past.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Decides when a record is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    grace: Duration,
    /// Delete exhausted sources (otherwise they are only withheld).
    pub prune: bool,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        StalenessPolicy {
            grace: Duration::hours(24),
            prune: true,
        }
    }
}

impl StalenessPolicy {
    pub fn new(grace_hours: i64, prune: bool) -> Self {
        StalenessPolicy {
            grace: Duration::hours(grace_hours),
            prune,
        }
    }

    /// True only if there is at least one date and all of them lie more than
    /// the grace window before `now`.
    pub fn is_exhausted(&self, dates: &[DateTime<Tz>], now: DateTime<Utc>) -> bool {
        !dates.is_empty()
            && dates
                .iter()
                .all(|date| now.signed_duration_since(date.with_timezone(&Utc)) > self.grace)
    }
}
