//! Lease table access: conditional upsert for acquisition, conditional
//! delete for release.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr};

use crate::db::entities::{prelude::*, scheduler_lease};
use crate::scheduler::store::LeaseStore;

#[derive(Clone)]
pub struct LeaseService {
    db: DatabaseConnection,
}

impl LeaseService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeaseStore for LeaseService {
    async fn try_acquire(
        &self,
        target_id: i32,
        holder_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let expires_at = now
            .checked_add_signed(lease_duration)
            .ok_or_else(|| DbErr::Custom(format!("lease expiry out of range: {lease_duration}")))?;
        let lease = scheduler_lease::ActiveModel {
            target_id: Set(target_id),
            holder_id: Set(holder_id.to_string()),
            acquired_at: Set(now),
            expires_at: Set(expires_at),
        };

        // A single statement: insert, or overwrite only an expired row (or our own).
        // Concurrent callers serialize on the primary key, so one of them wins.
        let rows_affected = SchedulerLease::insert(lease)
            .on_conflict(
                OnConflict::column(scheduler_lease::Column::TargetId)
                    .update_columns([
                        scheduler_lease::Column::HolderId,
                        scheduler_lease::Column::AcquiredAt,
                        scheduler_lease::Column::ExpiresAt,
                    ])
                    .action_and_where(
                        Expr::col((SchedulerLease, scheduler_lease::Column::ExpiresAt))
                            .lte(now)
                            .or(Expr::col((SchedulerLease, scheduler_lease::Column::HolderId))
                                .eq(holder_id)),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match rows_affected {
            Ok(rows) => Ok(rows == 1),
            // The target was deleted after it was selected; nothing to lease.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn release(&self, target_id: i32, holder_id: &str) -> Result<bool, DbErr> {
        let result = SchedulerLease::delete_many()
            .filter(scheduler_lease::Column::TargetId.eq(target_id))
            .filter(scheduler_lease::Column::HolderId.eq(holder_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn current(&self, target_id: i32) -> Result<Option<scheduler_lease::Model>, DbErr> {
        SchedulerLease::find_by_id(target_id).one(&self.db).await
    }
}
