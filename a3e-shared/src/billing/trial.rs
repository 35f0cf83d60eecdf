/// Free-trial window
///
/// A trial is the half-open interval `[started_at, ends_at)`. Construction
/// rejects windows whose end is not strictly after their start, matching
/// the `users_trial_window_check` constraint.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the free trial
pub const TRIAL_DAYS: i64 = 14;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Trial must end after it starts")]
pub struct InvalidTrialWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialWindow {
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl TrialWindow {
    pub fn new(started_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, InvalidTrialWindow> {
        if ends_at <= started_at {
            return Err(InvalidTrialWindow);
        }
        Ok(Self { started_at, ends_at })
    }

    /// `[now, now + days)`
    pub fn starting_now(days: i64) -> Result<Self, InvalidTrialWindow> {
        let now = Utc::now();
        Self::new(now, now + Duration::days(days))
    }

    /// Smallest valid window that is already over at `started_at`
    pub(crate) fn expired_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ends_at: started_at + Duration::seconds(1),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.started_at && now < self.ends_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Whole days left, rounded up; zero once expired
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.is_expired(now) {
            return 0;
        }
        let secs = (self.ends_at - now).num_seconds();
        (secs + 86_399) / 86_400
    }

    /// Whole days elapsed since the trial began
    pub fn days_elapsed(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_days().max(0)
    }
}
