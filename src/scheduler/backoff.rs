//! Due-selection and rescheduling rules.

use chrono::{DateTime, Duration, Utc};

use crate::db::entities::monitored_target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub multiplier: u64,
    pub max_backoff_seconds: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max_backoff_seconds: 3600,
        }
    }
}

/// New scheduling fields for a target after one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub next_check_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub consecutive_failures: i32,
}

/// A target is due when it is active and its next check time was never set
/// or lies strictly before `now`.
pub fn is_due(target: &monitored_target::Model, now: DateTime<Utc>) -> bool {
    target.is_active && target.next_check_at.map_or(true, |next| next < now)
}

fn add_seconds(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    let delta = i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl BackoffPolicy {
    /// `min(interval * multiplier ^ failures, max_backoff)`, saturating.
    pub fn failure_delay_seconds(&self, check_interval_seconds: u64, consecutive_failures: u32) -> u64 {
        let factor = self
            .multiplier
            .checked_pow(consecutive_failures)
            .unwrap_or(u64::MAX);
        check_interval_seconds
            .saturating_mul(factor)
            .min(self.max_backoff_seconds)
    }

    pub fn next_schedule(
        &self,
        target: &monitored_target::Model,
        healthy: bool,
        now: DateTime<Utc>,
    ) -> ScheduleUpdate {
        let interval = u64::try_from(target.check_interval_seconds).unwrap_or(0);
        if healthy {
            return ScheduleUpdate {
                next_check_at: add_seconds(now, interval),
                last_checked_at: now,
                consecutive_failures: 0,
            };
        }

        let failures = target.consecutive_failures.max(0).saturating_add(1);
        let delay = self.failure_delay_seconds(interval, failures.unsigned_abs());
        ScheduleUpdate {
            next_check_at: add_seconds(now, delay),
            last_checked_at: now,
            consecutive_failures: failures,
        }
    }
}
