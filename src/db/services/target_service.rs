//! Service for monitored targets.
//!
//! Covers the scheduler's view (due selection, re-read under lease, schedule
//! writes) and the CRUD used by the HTTP API. CRUD touches only configuration
//! columns; the scheduler touches only scheduling columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, NullOrdering};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{monitored_target, prelude::*, scheduler_lease};
use crate::scheduler::backoff::ScheduleUpdate;
use crate::scheduler::store::TargetRepository;
use crate::web::models::target_models::{CreateTarget, UpdateTarget};

#[derive(Clone)]
pub struct TargetService {
    db: DatabaseConnection,
}

impl TargetService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a new target. It is due immediately (`next_check_at` null).
    /// A duplicate URL surfaces as a unique-constraint `DbErr`.
    pub async fn create_target(&self, data: CreateTarget) -> Result<monitored_target::Model, DbErr> {
        let now = Utc::now();
        let target = monitored_target::ActiveModel {
            url: Set(data.url),
            name: Set(data.name),
            check_interval_seconds: Set(data.check_interval),
            timeout_seconds: Set(data.timeout),
            is_active: Set(data.is_active.unwrap_or(true)),
            next_check_at: Set(None),
            last_checked_at: Set(None),
            consecutive_failures: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(target_id = target.id, url = %target.url, "Monitored target created.");
        Ok(target)
    }

    pub async fn get_target(&self, target_id: i32) -> Result<Option<monitored_target::Model>, DbErr> {
        MonitoredTarget::find_by_id(target_id).one(&self.db).await
    }

    pub async fn list_targets(&self) -> Result<Vec<monitored_target::Model>, DbErr> {
        MonitoredTarget::find()
            .order_by_asc(monitored_target::Column::Id)
            .all(&self.db)
            .await
    }

    /// Applies the provided configuration fields. `Ok(None)` when the target
    /// does not exist.
    pub async fn update_target(
        &self,
        target_id: i32,
        changes: UpdateTarget,
    ) -> Result<Option<monitored_target::Model>, DbErr> {
        let Some(existing) = MonitoredTarget::find_by_id(target_id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut target: monitored_target::ActiveModel = existing.into();
        if let Some(name) = changes.name {
            target.name = Set(name);
        }
        if let Some(interval) = changes.check_interval {
            target.check_interval_seconds = Set(interval);
        }
        if let Some(timeout) = changes.timeout {
            target.timeout_seconds = Set(timeout);
        }
        if let Some(is_active) = changes.is_active {
            target.is_active = Set(is_active);
        }
        target.updated_at = Set(Utc::now());

        let updated = target.update(&self.db).await?;
        info!(target_id, "Monitored target updated.");
        Ok(Some(updated))
    }

    /// Deletes the target and its lease in one transaction. Returns false when
    /// nothing was deleted.
    pub async fn delete_target(&self, target_id: i32) -> Result<bool, DbErr> {
        let txn = self.db.begin().await?;

        SchedulerLease::delete_many()
            .filter(scheduler_lease::Column::TargetId.eq(target_id))
            .exec(&txn)
            .await?;
        let result = MonitoredTarget::delete_by_id(target_id).exec(&txn).await?;

        txn.commit().await?;

        if result.rows_affected > 0 {
            info!(target_id, "Monitored target deleted.");
        }
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl TargetRepository for TargetService {
    async fn select_due(
        &self,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<monitored_target::Model>, DbErr> {
        MonitoredTarget::find()
            .filter(monitored_target::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(monitored_target::Column::NextCheckAt.is_null())
                    .add(monitored_target::Column::NextCheckAt.lt(now)),
            )
            .order_by_with_nulls(
                monitored_target::Column::NextCheckAt,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(monitored_target::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
    }

    async fn find(&self, target_id: i32) -> Result<Option<monitored_target::Model>, DbErr> {
        self.get_target(target_id).await
    }

    async fn record_schedule(&self, target_id: i32, update: &ScheduleUpdate) -> Result<bool, DbErr> {
        let result = MonitoredTarget::update_many()
            .col_expr(
                monitored_target::Column::NextCheckAt,
                Expr::value(update.next_check_at),
            )
            .col_expr(
                monitored_target::Column::LastCheckedAt,
                Expr::value(update.last_checked_at),
            )
            .col_expr(
                monitored_target::Column::ConsecutiveFailures,
                Expr::value(update.consecutive_failures),
            )
            .filter(monitored_target::Column::Id.eq(target_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
