//! Storage seams used by the scheduler loop.
//!
//! The Postgres implementations live in `crate::db::services`; the loop only
//! sees these traits so storage handles are passed in explicitly.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::DbErr;

use super::backoff::ScheduleUpdate;
use crate::db::entities::{monitored_target, scheduler_lease};
use crate::monitor::outcome::CheckOutcome;

#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Active targets whose `next_check_at` is null or before `now`, nulls
    /// first then oldest first, at most `limit` rows.
    async fn select_due(
        &self,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<monitored_target::Model>, DbErr>;

    async fn find(&self, target_id: i32) -> Result<Option<monitored_target::Model>, DbErr>;

    /// Writes only the scheduling fields. Returns false when the target no
    /// longer exists.
    async fn record_schedule(&self, target_id: i32, update: &ScheduleUpdate) -> Result<bool, DbErr>;
}

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically claims `target_id` for `holder_id` until `now + lease_duration`.
    /// Fails without side effects while another holder's lease is live.
    async fn try_acquire(
        &self,
        target_id: i32,
        holder_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr>;

    /// Deletes the lease only if `holder_id` still owns it. Returns whether a
    /// row was removed.
    async fn release(&self, target_id: i32, holder_id: &str) -> Result<bool, DbErr>;

    async fn current(&self, target_id: i32) -> Result<Option<scheduler_lease::Model>, DbErr>;
}

/// One history row to append.
#[derive(Debug, Clone)]
pub struct CheckRecord {
    pub target_url: String,
    pub timeout_seconds: i32,
    pub outcome: CheckOutcome,
    pub observed_at: DateTime<Utc>,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn append(&self, record: CheckRecord) -> Result<(), DbErr>;
}
