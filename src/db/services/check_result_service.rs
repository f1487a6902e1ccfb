//! Append-only check history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::db::entities::{check_result, prelude::*};
use crate::scheduler::store::{CheckRecord, ResultSink};

#[derive(Clone)]
pub struct CheckResultService {
    db: DatabaseConnection,
}

impl CheckResultService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Results observed at or after `since`, newest first.
    pub async fn list_history(
        &self,
        url: Option<&str>,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<check_result::Model>, DbErr> {
        let mut query = CheckResult::find().filter(check_result::Column::ObservedAt.gte(since));
        if let Some(url) = url {
            query = query.filter(check_result::Column::TargetUrl.eq(url));
        }
        query
            .order_by_desc(check_result::Column::ObservedAt)
            .order_by_desc(check_result::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
    }
}

impl From<CheckRecord> for check_result::ActiveModel {
    fn from(record: CheckRecord) -> Self {
        let outcome = &record.outcome;
        check_result::ActiveModel {
            target_url: Set(record.target_url),
            timeout_seconds: Set(record.timeout_seconds),
            outcome: Set(outcome.kind().to_string()),
            status_code: Set(outcome.status_code().map(i32::from)),
            is_healthy: Set(outcome.is_healthy()),
            response_time_ms: Set(outcome.response_time_ms()),
            error_message: Set(outcome.error_message()),
            observed_at: Set(record.observed_at),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResultSink for CheckResultService {
    async fn append(&self, record: CheckRecord) -> Result<(), DbErr> {
        check_result::ActiveModel::from(record)
            .insert(&self.db)
            .await?;
        Ok(())
    }
}
